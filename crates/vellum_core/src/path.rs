//! Paths into entity content, reported by the traversal.

use std::fmt;

/// One step of a content path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A named field or object key.
    Field(String),
    /// A position in a list or a node's children.
    Index(usize),
}

/// A path from an entity's field map down to a value or node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentPath(Vec<PathSegment>);

impl ContentPath {
    /// The empty root path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns the path extended with a field segment.
    pub fn with_field(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Field(name.to_owned()));
        Self(segments)
    }

    /// Returns the path extended with an index segment.
    pub fn with_index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    /// The path's segments, root first.
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            match segment {
                PathSegment::Field(name) => {
                    if !first {
                        write!(f, ".")?;
                    }
                    write!(f, "{name}")?;
                }
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
            first = false;
        }
        if first {
            write!(f, "(root)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        let path = ContentPath::root()
            .with_field("body")
            .with_field("root")
            .with_index(2)
            .with_field("value")
            .with_field("text");
        assert_eq!(path.to_string(), "body.root[2].value.text");
    }

    #[test]
    fn root_displays_as_root() {
        assert_eq!(ContentPath::root().to_string(), "(root)");
    }
}
