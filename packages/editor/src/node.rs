use modforge_data::{NodePath, Scalar, Step, Value};
use modforge_schema::PropertyDescriptor;

/// Where a node's effective value originates.
///
/// Derived on merge and after every applied op; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Comes unmodified from the base dataset
    Inherited,
    /// Stored in the overlay, differing from or absent in the base
    Overridden,
    /// Present in neither layer; supplied by the schema default
    Default,
}

/// One node of the merged document tree
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentNode {
    pub provenance: Provenance,
    /// Schema coverage; `None` for extra members the schema does not declare
    pub descriptor: Option<PropertyDescriptor>,
    pub content: NodeContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeContent {
    Scalar(Scalar),
    Object(Vec<(String, DocumentNode)>),
    Array(Vec<DocumentNode>),
}

impl DocumentNode {
    /// A bare overridden node built from a raw value, with no annotations.
    /// Used for freshly inserted subtrees; the recompute pass that follows
    /// every applied op supplies provenance and descriptors.
    pub(crate) fn from_value(value: &Value) -> Self {
        let content = match value {
            Value::Scalar(scalar) => NodeContent::Scalar(scalar.clone()),
            Value::Object(members) => NodeContent::Object(
                members
                    .iter()
                    .map(|(name, member)| (name.clone(), DocumentNode::from_value(member)))
                    .collect(),
            ),
            Value::Array(elements) => {
                NodeContent::Array(elements.iter().map(DocumentNode::from_value).collect())
            }
        };
        Self {
            provenance: Provenance::Overridden,
            descriptor: None,
            content,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.content, NodeContent::Scalar(_))
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.content {
            NodeContent::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn members(&self) -> Option<&[(String, DocumentNode)]> {
        match &self.content {
            NodeContent::Object(members) => Some(members),
            _ => None,
        }
    }

    pub fn elements(&self) -> Option<&[DocumentNode]> {
        match &self.content {
            NodeContent::Array(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn member(&self, name: &str) -> Option<&DocumentNode> {
        self.members()?
            .iter()
            .find(|(member, _)| member == name)
            .map(|(_, node)| node)
    }

    pub(crate) fn member_mut(&mut self, name: &str) -> Option<&mut DocumentNode> {
        match &mut self.content {
            NodeContent::Object(members) => members
                .iter_mut()
                .find(|(member, _)| member == name)
                .map(|(_, node)| node),
            _ => None,
        }
    }

    /// Navigate to a descendant
    pub fn at(&self, path: &NodePath) -> Option<&DocumentNode> {
        let mut current = self;
        for step in path.steps() {
            current = match (step, &current.content) {
                (Step::Member(name), NodeContent::Object(_)) => current.member(name)?,
                (Step::Index(index), NodeContent::Array(elements)) => elements.get(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub(crate) fn at_mut(&mut self, path: &NodePath) -> Option<&mut DocumentNode> {
        let mut current = self;
        for step in path.steps() {
            current = match step {
                Step::Member(name) => current.member_mut(name)?,
                Step::Index(index) => match &mut current.content {
                    NodeContent::Array(elements) => elements.get_mut(*index)?,
                    _ => return None,
                },
            };
        }
        Some(current)
    }

    /// The full merged view as a plain value, defaults included
    pub fn to_value(&self) -> Value {
        match &self.content {
            NodeContent::Scalar(scalar) => Value::Scalar(scalar.clone()),
            NodeContent::Object(members) => Value::Object(
                members
                    .iter()
                    .map(|(name, node)| (name.clone(), node.to_value()))
                    .collect(),
            ),
            NodeContent::Array(elements) => {
                Value::Array(elements.iter().map(|node| node.to_value()).collect())
            }
        }
    }

    /// The value as stored across the two layers: schema-defaulted nodes
    /// are absent, everything else is present. This is what merging takes
    /// as the overlay projection and what the save delta is computed from.
    pub fn effective_value(&self) -> Option<Value> {
        if self.provenance == Provenance::Default {
            return None;
        }
        Some(match &self.content {
            NodeContent::Scalar(scalar) => Value::Scalar(scalar.clone()),
            NodeContent::Object(members) => Value::Object(
                members
                    .iter()
                    .filter_map(|(name, node)| {
                        node.effective_value().map(|value| (name.clone(), value))
                    })
                    .collect(),
            ),
            NodeContent::Array(elements) => Value::Array(
                elements
                    .iter()
                    .filter_map(|node| node.effective_value())
                    .collect(),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(provenance: Provenance, scalar: Scalar) -> DocumentNode {
        DocumentNode {
            provenance,
            descriptor: None,
            content: NodeContent::Scalar(scalar),
        }
    }

    #[test]
    fn test_effective_value_prunes_defaults() {
        let node = DocumentNode {
            provenance: Provenance::Overridden,
            descriptor: None,
            content: NodeContent::Object(vec![
                ("hull".to_string(), leaf(Provenance::Overridden, Scalar::Int(120))),
                ("armor".to_string(), leaf(Provenance::Default, Scalar::Int(0))),
            ]),
        };

        assert_eq!(
            node.effective_value(),
            Some(Value::Object(vec![("hull".to_string(), Value::int(120))]))
        );
        assert_eq!(
            node.to_value(),
            Value::Object(vec![
                ("hull".to_string(), Value::int(120)),
                ("armor".to_string(), Value::int(0)),
            ])
        );
    }

    #[test]
    fn test_navigation() {
        let node = DocumentNode {
            provenance: Provenance::Inherited,
            descriptor: None,
            content: NodeContent::Object(vec![(
                "tags".to_string(),
                DocumentNode {
                    provenance: Provenance::Inherited,
                    descriptor: None,
                    content: NodeContent::Array(vec![leaf(
                        Provenance::Inherited,
                        Scalar::Str("strike".to_string()),
                    )]),
                },
            )]),
        };

        let path = NodePath::root().child("tags").element(0);
        assert_eq!(
            node.at(&path).and_then(|n| n.as_scalar()),
            Some(&Scalar::Str("strike".to_string()))
        );
        assert!(node.at(&NodePath::root().child("tags").element(1)).is_none());
    }
}
