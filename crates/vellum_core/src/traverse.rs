//! Generic content traversal.
//!
//! `traverse_entity` walks an entity's field values depth-first, guided by
//! the type's field specs, and yields a lazy sequence of typed nodes.
//! Nested components and rich-text component nodes are descended into
//! recursively. The traversal never mutates its input and never fails: a
//! structural mismatch (list where a single value is expected, unknown
//! component type, ...) yields an error node carrying the content path, so
//! collectors can keep consuming the rest of the stream.

use vellum_schema::{ComponentTypeSpec, EntityTypeSpec, FieldSpec, FieldType, Schema};

use crate::path::ContentPath;
use crate::richtext::RichTextNode;
use crate::value::{ComponentValue, FieldMap, FieldValue};

/// A node produced by the content traversal.
#[derive(Debug)]
pub enum ContentNode<'a> {
    /// A field of an entity or component, with its value (if any).
    Field {
        /// Path to the field.
        path: ContentPath,
        /// The field's spec.
        field: &'a FieldSpec,
        /// The field's value; `None` when absent.
        value: Option<&'a FieldValue>,
    },
    /// One item of a list field.
    FieldItem {
        /// Path to the item.
        path: ContentPath,
        /// The owning field's spec.
        field: &'a FieldSpec,
        /// The item value.
        value: &'a FieldValue,
    },
    /// An embedded component (from a field or a rich-text node).
    Component {
        /// Path to the component value.
        path: ContentPath,
        /// The component type's spec.
        spec: &'a ComponentTypeSpec,
        /// The component value.
        value: &'a ComponentValue,
    },
    /// A node of a rich-text document.
    RichTextNode {
        /// Path to the node.
        path: ContentPath,
        /// The owning field's spec.
        field: &'a FieldSpec,
        /// The node.
        node: &'a RichTextNode,
    },
    /// A structural mismatch between spec and value.
    Error {
        /// Path to the offending value.
        path: ContentPath,
        /// What went wrong.
        message: String,
    },
}

enum Task<'a> {
    Fields {
        fields: &'a [FieldSpec],
        values: &'a FieldMap,
        path: ContentPath,
    },
    Field {
        field: &'a FieldSpec,
        value: Option<&'a FieldValue>,
        path: ContentPath,
    },
    Item {
        field: &'a FieldSpec,
        value: &'a FieldValue,
        path: ContentPath,
    },
    Scalar {
        field: &'a FieldSpec,
        value: &'a FieldValue,
        path: ContentPath,
    },
    ComponentValue {
        value: &'a ComponentValue,
        path: ContentPath,
    },
    Node {
        field: &'a FieldSpec,
        node: &'a RichTextNode,
        path: ContentPath,
    },
    Error {
        path: ContentPath,
        message: String,
    },
}

/// Lazy, depth-first iterator over an entity's or component's content.
pub struct ContentTraversal<'a> {
    schema: &'a Schema,
    stack: Vec<Task<'a>>,
}

/// Traverses an entity's fields under its type spec.
pub fn traverse_entity<'a>(
    schema: &'a Schema,
    type_spec: &'a EntityTypeSpec,
    fields: &'a FieldMap,
) -> ContentTraversal<'a> {
    ContentTraversal {
        schema,
        stack: vec![Task::Fields {
            fields: &type_spec.fields,
            values: fields,
            path: ContentPath::root(),
        }],
    }
}

/// Traverses a standalone component value.
pub fn traverse_component<'a>(
    schema: &'a Schema,
    value: &'a ComponentValue,
) -> ContentTraversal<'a> {
    ContentTraversal {
        schema,
        stack: vec![Task::ComponentValue {
            value,
            path: ContentPath::root(),
        }],
    }
}

impl<'a> Iterator for ContentTraversal<'a> {
    type Item = ContentNode<'a>;

    fn next(&mut self) -> Option<ContentNode<'a>> {
        loop {
            match self.stack.pop()? {
                Task::Fields {
                    fields,
                    values,
                    path,
                } => {
                    for field in fields.iter().rev() {
                        self.stack.push(Task::Field {
                            field,
                            value: values.get(&field.name),
                            path: path.with_field(&field.name),
                        });
                    }
                }
                Task::Field { field, value, path } => {
                    match value {
                        None | Some(FieldValue::Null) => {}
                        Some(FieldValue::List(items)) => {
                            if field.list {
                                for (index, item) in items.iter().enumerate().rev() {
                                    self.stack.push(Task::Item {
                                        field,
                                        value: item,
                                        path: path.with_index(index),
                                    });
                                }
                            } else {
                                self.stack.push(Task::Error {
                                    path: path.clone(),
                                    message: "expected a single value, got a list".into(),
                                });
                            }
                        }
                        Some(value) => {
                            if field.list {
                                self.stack.push(Task::Error {
                                    path: path.clone(),
                                    message: "expected a list, got a single value".into(),
                                });
                            } else {
                                self.stack.push(Task::Scalar {
                                    field,
                                    value,
                                    path: path.clone(),
                                });
                            }
                        }
                    }
                    return Some(ContentNode::Field { path, field, value });
                }
                Task::Item { field, value, path } => {
                    if matches!(value, FieldValue::List(_)) {
                        self.stack.push(Task::Error {
                            path: path.clone(),
                            message: "list items must not be lists".into(),
                        });
                    } else {
                        self.stack.push(Task::Scalar {
                            field,
                            value,
                            path: path.clone(),
                        });
                    }
                    return Some(ContentNode::FieldItem { path, field, value });
                }
                Task::Scalar { field, value, path } => match value {
                    FieldValue::Component(component) => {
                        if matches!(field.field_type, FieldType::Component { .. }) {
                            self.stack.push(Task::ComponentValue {
                                value: component,
                                path,
                            });
                        } else {
                            return Some(ContentNode::Error {
                                path,
                                message: format!(
                                    "unexpected component value in {} field",
                                    field.field_type.name()
                                ),
                            });
                        }
                    }
                    FieldValue::RichText(doc) => {
                        if matches!(field.field_type, FieldType::RichText) {
                            self.stack.push(Task::Node {
                                field,
                                node: &doc.root,
                                path: path.with_field("root"),
                            });
                        } else {
                            return Some(ContentNode::Error {
                                path,
                                message: format!(
                                    "unexpected rich text value in {} field",
                                    field.field_type.name()
                                ),
                            });
                        }
                    }
                    _ => {}
                },
                Task::ComponentValue { value, path } => {
                    match self.schema.component_type(&value.component_type) {
                        Some(spec) => {
                            self.stack.push(Task::Fields {
                                fields: &spec.fields,
                                values: &value.fields,
                                path: path.clone(),
                            });
                            return Some(ContentNode::Component { path, spec, value });
                        }
                        None => {
                            return Some(ContentNode::Error {
                                path,
                                message: format!(
                                    "unknown component type {}",
                                    value.component_type
                                ),
                            });
                        }
                    }
                }
                Task::Node { field, node, path } => {
                    if let RichTextNode::Component { value } = node {
                        self.stack.push(Task::ComponentValue {
                            value,
                            path: path.with_field("value"),
                        });
                    } else if let Some(children) = node.children() {
                        for (index, child) in children.iter().enumerate().rev() {
                            self.stack.push(Task::Node {
                                field,
                                node: child,
                                path: path.with_index(index),
                            });
                        }
                    }
                    return Some(ContentNode::RichTextNode { path, field, node });
                }
                Task::Error { path, message } => {
                    return Some(ContentNode::Error { path, message });
                }
            }
        }
    }
}
