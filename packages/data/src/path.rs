//! Paths addressing individual nodes inside a document tree.

use std::fmt;

/// One navigation step: an object member or an array index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    Member(String),
    Index(usize),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Member(name) => write!(f, "{}", name),
            Step::Index(index) => write!(f, "{}", index),
        }
    }
}

/// A path from the document root to one node, e.g. `weapons/0/damage`.
///
/// The empty path addresses the root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodePath {
    steps: Vec<Step>,
}

impl NodePath {
    pub fn root() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Extend with an object member step
    pub fn child(mut self, name: impl Into<String>) -> Self {
        self.steps.push(Step::Member(name.into()));
        self
    }

    /// Extend with an array index step
    pub fn element(mut self, index: usize) -> Self {
        self.steps.push(Step::Index(index));
        self
    }

    pub fn first(&self) -> Option<&Step> {
        self.steps.first()
    }

    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// The path of the containing node, or `None` at the root
    pub fn parent(&self) -> Option<NodePath> {
        if self.steps.is_empty() {
            return None;
        }
        Some(NodePath {
            steps: self.steps[..self.steps.len() - 1].to_vec(),
        })
    }

    /// Parse a `/`-separated path; all-digit segments become indices.
    pub fn parse(text: &str) -> Self {
        let mut path = NodePath::root();
        for segment in text.split('/').filter(|segment| !segment.is_empty()) {
            path = match segment.parse::<usize>() {
                Ok(index) => path.element(index),
                Err(_) => path.child(segment),
            };
        }
        path
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "/");
        }
        for (position, step) in self.steps.iter().enumerate() {
            if position > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_display() {
        let path = NodePath::root().child("weapons").element(2).child("damage");
        assert_eq!(path.to_string(), "weapons/2/damage");
        assert_eq!(NodePath::root().to_string(), "/");
    }

    #[test]
    fn test_parent() {
        let path = NodePath::root().child("weapons").element(2);
        assert_eq!(path.parent(), Some(NodePath::root().child("weapons")));
        assert_eq!(NodePath::root().parent(), None);
    }

    #[test]
    fn test_parse_round_trip() {
        let path = NodePath::parse("weapons/2/damage");
        assert_eq!(
            path.steps(),
            &[
                Step::Member("weapons".to_string()),
                Step::Index(2),
                Step::Member("damage".to_string())
            ]
        );
        assert_eq!(NodePath::parse("/"), NodePath::root());
    }
}
