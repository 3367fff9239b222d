use serde::{Deserialize, Serialize};

use modforge_data::{Scalar, Value};

use crate::descriptor::ReferenceKind;

/// Upper bound on schema/value walks.
///
/// Entity schemas are acyclic in practice, but the engine must not depend on
/// that: anything deeper than this is treated as undescribed rather than
/// recursed into.
pub const MAX_SCHEMA_DEPTH: usize = 64;

/// The value shape a schema node allows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Any,
}

impl SchemaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::String => "string",
            SchemaKind::Number => "number",
            SchemaKind::Integer => "integer",
            SchemaKind::Boolean => "boolean",
            SchemaKind::Object => "object",
            SchemaKind::Array => "array",
            SchemaKind::Any => "any",
        }
    }

    /// Whether a concrete value satisfies this kind
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (SchemaKind::Any, _) => true,
            (SchemaKind::String, Value::Scalar(Scalar::Str(_))) => true,
            (SchemaKind::Integer, Value::Scalar(Scalar::Int(_))) => true,
            (SchemaKind::Number, Value::Scalar(Scalar::Int(_) | Scalar::Float(_))) => true,
            (SchemaKind::Boolean, Value::Scalar(Scalar::Bool(_))) => true,
            (SchemaKind::Object, Value::Object(_)) => true,
            (SchemaKind::Array, Value::Array(_)) => true,
            _ => false,
        }
    }

    /// Type-appropriate zero, used when a declared member has no default
    pub fn zero_value(&self) -> Value {
        match self {
            SchemaKind::String => Value::string(""),
            SchemaKind::Number => Value::float(0.0),
            SchemaKind::Integer => Value::int(0),
            SchemaKind::Boolean => Value::bool(false),
            SchemaKind::Object => Value::Object(Vec::new()),
            SchemaKind::Array => Value::Array(Vec::new()),
            SchemaKind::Any => Value::Scalar(Scalar::Null),
        }
    }
}

/// Recursive description of an allowed value shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaNode {
    pub kind: SchemaKind,

    /// Declared members, in declaration order (object schemas)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<SchemaMember>,

    /// Shared element schema (array schemas)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<Box<SchemaNode>>,

    /// Closed objects reject members beyond the declared set
    #[serde(default)]
    pub closed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Allowed values for enumerated strings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,

    /// Declared semantic meaning of a string leaf
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceKind>,
}

impl SchemaNode {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            members: Vec::new(),
            element: None,
            closed: false,
            default: None,
            options: None,
            reference: None,
        }
    }

    /// Look up a declared member by name
    pub fn member(&self, name: &str) -> Option<&SchemaMember> {
        self.members.iter().find(|member| member.name == name)
    }

    /// The default for this node: the declared one, else the kind's zero
    pub fn default_value(&self) -> Value {
        self.default
            .clone()
            .unwrap_or_else(|| self.kind.zero_value())
    }
}

/// One declared object member and its structural flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaMember {
    pub name: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub read_only: bool,

    /// Written to the overlay even when equal to the inherited value
    #[serde(default)]
    pub always_write: bool,

    pub schema: SchemaNode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_admits() {
        assert!(SchemaKind::Number.admits(&Value::int(3)));
        assert!(SchemaKind::Number.admits(&Value::float(0.5)));
        assert!(!SchemaKind::Integer.admits(&Value::float(0.5)));
        assert!(!SchemaKind::String.admits(&Value::int(3)));
        assert!(SchemaKind::Any.admits(&Value::Array(Vec::new())));
    }

    #[test]
    fn test_schema_from_json() {
        let schema: SchemaNode = serde_json::from_str(
            r#"{
                "kind": "object",
                "closed": true,
                "members": [
                    {"name": "hull", "required": true, "schema": {"kind": "number", "default": 100.0}},
                    {"name": "icon", "schema": {"kind": "string", "reference": "texture"}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(schema.kind, SchemaKind::Object);
        assert!(schema.closed);
        assert!(schema.member("hull").unwrap().required);
        assert_eq!(
            schema.member("hull").unwrap().schema.default_value(),
            Value::float(100.0)
        );
        assert_eq!(
            schema.member("icon").unwrap().schema.reference,
            Some(ReferenceKind::Texture)
        );
    }

    #[test]
    fn test_zero_defaults() {
        let node = SchemaNode::new(SchemaKind::Integer);
        assert_eq!(node.default_value(), Value::int(0));
    }
}
