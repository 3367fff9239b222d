use serde::{Deserialize, Serialize};

use modforge_data::Value;

use crate::node::{SchemaKind, SchemaMember, SchemaNode};

/// Schema-declared semantic meaning of a string leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// Id of another entity in the dataset
    Entity,
    /// Key into the localized text tables
    Localization,
    /// Texture file
    Texture,
    /// Sound file
    Sound,
    /// Any other overlay-relative file path
    File,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Entity => "entity",
            ReferenceKind::Localization => "localization",
            ReferenceKind::Texture => "texture",
            ReferenceKind::Sound => "sound",
            ReferenceKind::File => "file",
        }
    }
}

/// Everything the editing surface needs to know about one document node.
///
/// Derived from the schema alone; nodes with no schema coverage carry no
/// descriptor and render as plain editable values.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    pub kind: SchemaKind,
    pub required: bool,
    pub read_only: bool,
    pub always_write: bool,
    /// The described node rejects undeclared members (objects only)
    pub closed: bool,
    pub options: Option<Vec<String>>,
    pub reference: Option<ReferenceKind>,
    pub default: Option<Value>,
}

impl PropertyDescriptor {
    /// Descriptor for a declared object member
    pub fn for_member(member: &SchemaMember) -> Self {
        Self {
            kind: member.schema.kind,
            required: member.required,
            read_only: member.read_only,
            always_write: member.always_write,
            closed: member.schema.closed,
            options: member.schema.options.clone(),
            reference: member.schema.reference,
            default: member.schema.default.clone(),
        }
    }

    /// Descriptor for a node addressed by schema alone: the document root
    /// or an array element sharing the element schema.
    pub fn for_node(node: &SchemaNode) -> Self {
        Self {
            kind: node.kind,
            required: false,
            read_only: false,
            always_write: false,
            closed: node.closed,
            options: node.options.clone(),
            reference: node.reference,
            default: node.default.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_descriptor_carries_flags() {
        let member = SchemaMember {
            name: "icon".to_string(),
            required: true,
            read_only: false,
            always_write: false,
            schema: SchemaNode {
                reference: Some(ReferenceKind::Texture),
                ..SchemaNode::new(SchemaKind::String)
            },
        };

        let descriptor = PropertyDescriptor::for_member(&member);
        assert!(descriptor.required);
        assert_eq!(descriptor.reference, Some(ReferenceKind::Texture));
        assert_eq!(descriptor.kind, SchemaKind::String);
    }

    #[test]
    fn test_node_descriptor_is_unconstrained() {
        let descriptor = PropertyDescriptor::for_node(&SchemaNode::new(SchemaKind::Object));
        assert!(!descriptor.required);
        assert!(!descriptor.read_only);
        assert!(descriptor.reference.is_none());
    }
}
