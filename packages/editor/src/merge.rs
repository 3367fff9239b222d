//! Layer merging and annotation.
//!
//! Builds the merged document tree from (base value, overlay projection,
//! schema). The same walk runs at load time and after every applied op, so
//! provenance, descriptors and synthesized defaults can never drift from
//! the underlying values.
//!
//! Merge rules:
//! - objects merge per member: an overlay member shadows the base member,
//!   base-only members are inherited alongside it; member order is
//!   canonical (base order, then overlay-only members by name, then
//!   synthesized members in schema order) so the tree is a pure function
//!   of the layers and the schema;
//! - arrays are atomic: an overlay array replaces the base array wholesale,
//!   so nothing is inherited member-wise below a differing array;
//! - schema-declared members present in neither layer are synthesized from
//!   the schema default (or a type-appropriate zero) and tagged as such;
//! - members the schema does not declare are kept as descriptor-less,
//!   still-editable nodes;
//! - a schema node whose kind does not admit the actual value stops
//!   describing that subtree instead of mislabeling it.

use tracing::warn;

use modforge_data::{Scalar, Value};
use modforge_schema::{PropertyDescriptor, SchemaKind, SchemaNode, MAX_SCHEMA_DEPTH};

use crate::node::{DocumentNode, NodeContent, Provenance};

/// Build the full document tree.
///
/// `projection` is the overlay-side value: the overlay file at load time,
/// the tree's effective value on recompute. `None` means the document is
/// pure inheritance at this point.
pub(crate) fn build_root(
    base: Option<&Value>,
    projection: Option<&Value>,
    schema: Option<&SchemaNode>,
) -> DocumentNode {
    let descriptor = schema.map(PropertyDescriptor::for_node);
    build_node(projection, base, schema, descriptor, 0)
}

/// Build one node. `over` wins over `base`; both absent means the node is
/// synthesized from the schema.
pub(crate) fn build_node(
    over: Option<&Value>,
    base: Option<&Value>,
    schema: Option<&SchemaNode>,
    descriptor: Option<PropertyDescriptor>,
    depth: usize,
) -> DocumentNode {
    // Schemas are acyclic in practice; do not bet correctness on it.
    let (schema, descriptor) = if depth >= MAX_SCHEMA_DEPTH {
        warn!(depth, "schema depth bound reached; leaving subtree undescribed");
        (None, None)
    } else {
        (schema, descriptor)
    };

    let Some(value) = over.or(base) else {
        return synthesize_default(schema, descriptor, depth);
    };

    // A schema that does not admit the actual shape stops describing here.
    let (schema, descriptor) = match schema {
        Some(node) if !node.kind.admits(value) => (None, None),
        _ => (schema, descriptor),
    };

    match value {
        Value::Object(_) => build_object(over, base, schema, descriptor, depth),
        Value::Array(_) => build_array(over, base, schema, descriptor, depth),
        Value::Scalar(scalar) => DocumentNode {
            provenance: leaf_provenance(over, base),
            descriptor,
            content: NodeContent::Scalar(scalar.clone()),
        },
    }
}

fn leaf_provenance(over: Option<&Value>, base: Option<&Value>) -> Provenance {
    match over {
        Some(value) if base == Some(value) => Provenance::Inherited,
        Some(_) => Provenance::Overridden,
        None => Provenance::Inherited,
    }
}

fn build_object(
    over: Option<&Value>,
    base: Option<&Value>,
    schema: Option<&SchemaNode>,
    descriptor: Option<PropertyDescriptor>,
    depth: usize,
) -> DocumentNode {
    let over_members = over.and_then(Value::as_object);
    let base_members = base.and_then(Value::as_object);

    // Member order must be a pure function of (base, overlay member set,
    // schema) — never of edit history — so that undoing any edit restores
    // the exact pre-edit tree: base order first, overlay-only members
    // sorted by name, schema-synthesized members last.
    let mut members: Vec<(String, DocumentNode)> = Vec::new();

    // Base members in base order; an overlay value shadows per member.
    if let Some(base_members) = base_members {
        for (name, base_value) in base_members {
            let over_value = over_members
                .and_then(|over| over.iter().find(|(member, _)| member == name))
                .map(|(_, value)| value);
            let (member_schema, member_descriptor) = member_annotation(schema, name);
            members.push((
                name.clone(),
                build_node(
                    over_value,
                    Some(base_value),
                    member_schema,
                    member_descriptor,
                    depth + 1,
                ),
            ));
        }
    }

    // Members the base does not know, sorted by name.
    if let Some(over_members) = over_members {
        let mut extras: Vec<&(String, Value)> = over_members
            .iter()
            .filter(|(name, _)| !members.iter().any(|(member, _)| member == name))
            .collect();
        extras.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, over_value) in extras {
            let (member_schema, member_descriptor) = member_annotation(schema, name);
            members.push((
                name.clone(),
                build_node(
                    Some(over_value),
                    None,
                    member_schema,
                    member_descriptor,
                    depth + 1,
                ),
            ));
        }
    }

    // Declared members present in neither layer come from the schema.
    if let Some(schema) = schema {
        for declared in &schema.members {
            if members.iter().any(|(member, _)| member == &declared.name) {
                continue;
            }
            members.push((
                declared.name.clone(),
                synthesize_default(
                    Some(&declared.schema),
                    Some(PropertyDescriptor::for_member(declared)),
                    depth + 1,
                ),
            ));
        }
    }

    let provenance = if over.is_none() {
        Provenance::Inherited
    } else if base_members.is_none()
        || members
            .iter()
            .any(|(_, node)| node.provenance == Provenance::Overridden)
    {
        Provenance::Overridden
    } else {
        Provenance::Inherited
    };

    DocumentNode {
        provenance,
        descriptor,
        content: NodeContent::Object(members),
    }
}

fn build_array(
    over: Option<&Value>,
    base: Option<&Value>,
    schema: Option<&SchemaNode>,
    descriptor: Option<PropertyDescriptor>,
    depth: usize,
) -> DocumentNode {
    let provenance = leaf_provenance(over, base);
    let inherited = provenance == Provenance::Inherited;
    let base_elements = base.and_then(Value::as_array);

    let source = over
        .or(base)
        .and_then(Value::as_array)
        .expect("dispatched on array value");

    let element_schema = schema.and_then(|node| node.element.as_deref());

    let elements = source
        .iter()
        .enumerate()
        .map(|(index, element)| {
            // Below a differing array nothing is inherited member-wise.
            let (element_over, element_base) = if over.is_some() {
                let element_base = if inherited {
                    base_elements.and_then(|elements| elements.get(index))
                } else {
                    None
                };
                (Some(element), element_base)
            } else {
                (None, Some(element))
            };
            build_node(
                element_over,
                element_base,
                element_schema,
                element_schema.map(PropertyDescriptor::for_node),
                depth + 1,
            )
        })
        .collect();

    DocumentNode {
        provenance,
        descriptor,
        content: NodeContent::Array(elements),
    }
}

pub(crate) fn member_annotation<'s>(
    schema: Option<&'s SchemaNode>,
    name: &str,
) -> (Option<&'s SchemaNode>, Option<PropertyDescriptor>) {
    match schema.and_then(|node| node.member(name)) {
        Some(member) => (
            Some(&member.schema),
            Some(PropertyDescriptor::for_member(member)),
        ),
        None => (None, None),
    }
}

/// A node present in neither layer, built from the schema alone
pub(crate) fn synthesize_default(
    schema: Option<&SchemaNode>,
    descriptor: Option<PropertyDescriptor>,
    depth: usize,
) -> DocumentNode {
    let Some(schema) = schema else {
        return DocumentNode {
            provenance: Provenance::Default,
            descriptor,
            content: NodeContent::Scalar(Scalar::Null),
        };
    };

    if let Some(default) = &schema.default {
        return default_from_value(default, Some(schema), descriptor, depth);
    }

    let content = match schema.kind {
        SchemaKind::Object => {
            let members = if depth + 1 >= MAX_SCHEMA_DEPTH {
                Vec::new()
            } else {
                schema
                    .members
                    .iter()
                    .map(|member| {
                        (
                            member.name.clone(),
                            synthesize_default(
                                Some(&member.schema),
                                Some(PropertyDescriptor::for_member(member)),
                                depth + 1,
                            ),
                        )
                    })
                    .collect()
            };
            NodeContent::Object(members)
        }
        SchemaKind::Array => NodeContent::Array(Vec::new()),
        kind => match kind.zero_value() {
            Value::Scalar(scalar) => NodeContent::Scalar(scalar),
            _ => NodeContent::Scalar(Scalar::Null),
        },
    };

    DocumentNode {
        provenance: Provenance::Default,
        descriptor,
        content,
    }
}

/// Explicit schema defaults may be whole subtrees; annotate them while
/// keeping the defaulted provenance throughout.
fn default_from_value(
    value: &Value,
    schema: Option<&SchemaNode>,
    descriptor: Option<PropertyDescriptor>,
    depth: usize,
) -> DocumentNode {
    let schema = if depth >= MAX_SCHEMA_DEPTH { None } else { schema };
    let content = match value {
        Value::Scalar(scalar) => NodeContent::Scalar(scalar.clone()),
        Value::Object(members) => NodeContent::Object(
            members
                .iter()
                .map(|(name, member_value)| {
                    let (member_schema, member_descriptor) = member_annotation(schema, name);
                    (
                        name.clone(),
                        default_from_value(member_value, member_schema, member_descriptor, depth + 1),
                    )
                })
                .collect(),
        ),
        Value::Array(elements) => {
            let element_schema = schema.and_then(|node| node.element.as_deref());
            NodeContent::Array(
                elements
                    .iter()
                    .map(|element| {
                        default_from_value(
                            element,
                            element_schema,
                            element_schema.map(PropertyDescriptor::for_node),
                            depth + 1,
                        )
                    })
                    .collect(),
            )
        }
    };
    DocumentNode {
        provenance: Provenance::Default,
        descriptor,
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modforge_data::parse_document;
    use modforge_schema::SchemaMember;

    fn unit_schema() -> SchemaNode {
        serde_json::from_str(
            r#"{
                "kind": "object",
                "members": [
                    {"name": "hull", "required": true, "schema": {"kind": "number", "default": 100.0}},
                    {"name": "shield", "schema": {"kind": "number"}},
                    {"name": "tags", "schema": {"kind": "array", "element": {"kind": "string"}}}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_overlay_member_shadows_base() {
        let base = parse_document(r#"{"hull": 100, "shield": 50}"#).unwrap();
        let over = parse_document(r#"{"hull": 120}"#).unwrap();
        let schema = unit_schema();

        let root = build_root(Some(&base), Some(&over), Some(&schema));
        assert_eq!(root.provenance, Provenance::Overridden);

        let hull = root.member("hull").unwrap();
        assert_eq!(hull.provenance, Provenance::Overridden);
        assert_eq!(hull.as_scalar(), Some(&Scalar::Int(120)));

        let shield = root.member("shield").unwrap();
        assert_eq!(shield.provenance, Provenance::Inherited);
        assert_eq!(shield.as_scalar(), Some(&Scalar::Int(50)));
    }

    #[test]
    fn test_missing_declared_member_is_synthesized() {
        let base = parse_document(r#"{"shield": 50}"#).unwrap();
        let schema = unit_schema();

        let root = build_root(Some(&base), None, Some(&schema));
        assert_eq!(root.provenance, Provenance::Inherited);

        let hull = root.member("hull").unwrap();
        assert_eq!(hull.provenance, Provenance::Default);
        assert_eq!(hull.as_scalar(), Some(&Scalar::Float(100.0)));

        let tags = root.member("tags").unwrap();
        assert_eq!(tags.provenance, Provenance::Default);
        assert!(tags.elements().unwrap().is_empty());
    }

    #[test]
    fn test_extra_member_is_editable_but_undescribed() {
        let over = parse_document(r#"{"homebrew": true}"#).unwrap();
        let schema = unit_schema();

        let root = build_root(None, Some(&over), Some(&schema));
        let extra = root.member("homebrew").unwrap();
        assert_eq!(extra.provenance, Provenance::Overridden);
        assert!(extra.descriptor.is_none());
    }

    #[test]
    fn test_equal_overlay_value_counts_as_inherited() {
        let base = parse_document(r#"{"hull": 100}"#).unwrap();
        let over = parse_document(r#"{"hull": 100}"#).unwrap();

        let root = build_root(Some(&base), Some(&over), None);
        assert_eq!(root.provenance, Provenance::Inherited);
        assert_eq!(
            root.member("hull").unwrap().provenance,
            Provenance::Inherited
        );
    }

    #[test]
    fn test_differing_array_replaces_base_wholesale() {
        let base = parse_document(r#"{"tags": ["a", "b"]}"#).unwrap();
        let over = parse_document(r#"{"tags": ["c"]}"#).unwrap();

        let root = build_root(Some(&base), Some(&over), None);
        let tags = root.member("tags").unwrap();
        assert_eq!(tags.provenance, Provenance::Overridden);
        let elements = tags.elements().unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].provenance, Provenance::Overridden);
    }

    #[test]
    fn test_schema_kind_mismatch_degrades_to_undescribed() {
        let over = parse_document(r#"{"hull": "not a number"}"#).unwrap();
        let schema = unit_schema();

        let root = build_root(None, Some(&over), Some(&schema));
        let hull = root.member("hull").unwrap();
        assert!(hull.descriptor.is_none());
        assert_eq!(hull.as_scalar(), Some(&Scalar::Str("not a number".to_string())));
    }

    #[test]
    fn test_deep_schema_walk_terminates() {
        // A pathologically deep schema must degrade, not recurse away.
        let mut schema = SchemaNode::new(SchemaKind::Object);
        for _ in 0..(MAX_SCHEMA_DEPTH * 2) {
            let inner = schema;
            schema = SchemaNode::new(SchemaKind::Object);
            schema.members.push(SchemaMember {
                name: "nested".to_string(),
                required: false,
                read_only: false,
                always_write: false,
                schema: inner,
            });
        }

        let root = build_root(None, None, Some(&schema));
        // bounded synthesis: walking down must end well before the schema does
        let mut node = &root;
        let mut levels = 0;
        while let Some(next) = node.member("nested") {
            node = next;
            levels += 1;
            assert!(levels <= MAX_SCHEMA_DEPTH);
        }
    }
}
