//! Rich-text document tree.
//!
//! One fixed document grammar: a root holds block nodes, block nodes hold
//! inline nodes, and a component block embeds a component sub-tree that
//! the content traversal descends into recursively.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::ComponentValue;

/// A rich-text field value: a document tree under a single root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RichText {
    /// The document root. Must be a [`RichTextNode::Root`].
    pub root: RichTextNode,
}

impl RichText {
    /// Creates a document from block-level nodes.
    pub fn from_blocks(children: Vec<RichTextNode>) -> Self {
        Self {
            root: RichTextNode::Root { children },
        }
    }

    /// Creates a single-paragraph document from a text run.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::from_blocks(vec![RichTextNode::Paragraph {
            children: vec![RichTextNode::Text { text: text.into() }],
        }])
    }
}

/// A node in a rich-text document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RichTextNode {
    /// The document root.
    Root {
        /// Block-level children.
        #[serde(default)]
        children: Vec<RichTextNode>,
    },
    /// A paragraph block.
    Paragraph {
        /// Inline children.
        #[serde(default)]
        children: Vec<RichTextNode>,
    },
    /// A heading block.
    Heading {
        /// Heading level, 1-based.
        level: u8,
        /// Inline children.
        #[serde(default)]
        children: Vec<RichTextNode>,
    },
    /// An inline text run.
    Text {
        /// The text content.
        text: String,
    },
    /// An inline line break.
    Linebreak,
    /// A block-level embedded entity.
    Entity {
        /// The embedded entity's id.
        id: Uuid,
    },
    /// An inline link to an entity.
    #[serde(rename_all = "camelCase")]
    EntityLink {
        /// The linked entity's id.
        id: Uuid,
        /// Inline children (the link text).
        #[serde(default)]
        children: Vec<RichTextNode>,
    },
    /// A block-level embedded component.
    Component {
        /// The embedded component value.
        value: ComponentValue,
    },
}

impl RichTextNode {
    /// Returns the node's children, if it is a container node.
    pub fn children(&self) -> Option<&[RichTextNode]> {
        match self {
            Self::Root { children }
            | Self::Paragraph { children }
            | Self::Heading { children, .. }
            | Self::EntityLink { children, .. } => Some(children),
            Self::Text { .. } | Self::Linebreak | Self::Entity { .. } | Self::Component { .. } => {
                None
            }
        }
    }

    /// Mutable access to the node's children, if it is a container node.
    pub fn children_mut(&mut self) -> Option<&mut Vec<RichTextNode>> {
        match self {
            Self::Root { children }
            | Self::Paragraph { children }
            | Self::Heading { children, .. }
            | Self::EntityLink { children, .. } => Some(children),
            Self::Text { .. } | Self::Linebreak | Self::Entity { .. } | Self::Component { .. } => {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_tag_serialization() {
        let node = RichTextNode::EntityLink {
            id: Uuid::nil(),
            children: vec![RichTextNode::Text { text: "here".into() }],
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "entityLink");
        assert_eq!(json["children"][0]["type"], "text");
    }

    #[test]
    fn children_only_on_containers() {
        assert!(RichTextNode::Linebreak.children().is_none());
        assert!(RichTextNode::Root { children: vec![] }.children().is_some());
    }

    #[test]
    fn from_text_builds_paragraph() {
        let doc = RichText::from_text("hello");
        match &doc.root {
            RichTextNode::Root { children } => {
                assert_eq!(children.len(), 1);
                assert!(matches!(children[0], RichTextNode::Paragraph { .. }));
            }
            other => panic!("unexpected root: {other:?}"),
        }
    }
}
