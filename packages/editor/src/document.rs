//! # Document Model
//!
//! One open document: the merged, annotated, mutable view of a logical
//! path across the base and overlay layers.
//!
//! ## Lifecycle
//!
//! ```text
//! Load → Merge → Edit (via command stack) → Save
//!   ↓      ↓           ↓                      ↓
//! layers  tree    recompute subtree      overlay delta
//! ```
//!
//! Every applied op re-derives the affected annotations from
//! (base, overlay projection, schema). Ops at the document root change
//! shape and re-derive the whole tree — callers must expect root
//! operations on very large documents to take noticeably longer than the
//! subtree case.

use tracing::{debug, warn};

use modforge_data::{parse_document, to_json_pretty, NodePath, Step, Value};
use modforge_overlay::{LogicalPath, Origin, OverlayResolver};
use modforge_schema::{PropertyDescriptor, SchemaNode, SchemaRegistry};

use crate::errors::EditorError;
use crate::merge::{build_node, build_root, member_annotation, synthesize_default};
use crate::mutations::{EditOp, MutationError};
use crate::node::{DocumentNode, NodeContent, Provenance};

/// What `save` did to the overlay file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// An overlay delta was written
    Written,
    /// The document is pure inheritance; a stale overlay file was removed
    RemovedOverlay,
    /// The document is pure inheritance and no overlay file existed
    NoOverlay,
}

#[derive(Debug)]
enum DocumentBody {
    Tree(DocumentNode),
    /// Fallback for text that failed to parse: held verbatim, saved
    /// verbatim, structurally uneditable.
    Opaque { raw: String, origin: Origin },
}

/// One open document
#[derive(Debug)]
pub struct Document {
    path: LogicalPath,
    kind: String,
    body: DocumentBody,
    base: Option<Value>,
    schema: Option<SchemaNode>,
    version: u64,
}

impl Document {
    /// Load and merge both layers of a logical path.
    ///
    /// Malformed layer text degrades to an opaque document rather than
    /// failing the load; a missing schema degrades to an undescribed tree.
    pub fn load(
        resolver: &OverlayResolver,
        schemas: &SchemaRegistry,
        path: LogicalPath,
        kind: &str,
    ) -> Result<Self, EditorError> {
        let layers = resolver.read_layers(&path)?;
        let schema = schemas.schema_opt(kind).cloned();
        if schema.is_none() {
            debug!(%path, kind, "no schema registered; document loads undescribed");
        }

        let base = match &layers.base {
            Some(text) => match parse_document(text) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(%path, %err, "base layer failed to parse");
                    if layers.overlay.is_none() {
                        return Ok(Self::opaque(path, kind, schema, text.clone(), Origin::Base));
                    }
                    None
                }
            },
            None => None,
        };

        let overlay = match &layers.overlay {
            Some(text) => match parse_document(text) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(%path, %err, "overlay layer failed to parse");
                    return Ok(Self::opaque(path, kind, schema, text.clone(), Origin::Overlay));
                }
            },
            None => None,
        };

        let root = build_root(base.as_ref(), overlay.as_ref(), schema.as_ref());
        debug!(
            %path,
            kind,
            inherited_base = base.is_some(),
            has_overlay = overlay.is_some(),
            "document loaded"
        );

        Ok(Self {
            path,
            kind: kind.to_string(),
            body: DocumentBody::Tree(root),
            base,
            schema,
            version: 0,
        })
    }

    fn opaque(
        path: LogicalPath,
        kind: &str,
        schema: Option<SchemaNode>,
        raw: String,
        origin: Origin,
    ) -> Self {
        Self {
            path,
            kind: kind.to_string(),
            body: DocumentBody::Opaque { raw, origin },
            base: None,
            schema,
            version: 0,
        }
    }

    pub fn path(&self) -> &LogicalPath {
        &self.path
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Increments once per applied op, in either direction
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self.body, DocumentBody::Opaque { .. })
    }

    /// The unparsed text of an opaque document
    pub fn raw_text(&self) -> Option<&str> {
        match &self.body {
            DocumentBody::Opaque { raw, .. } => Some(raw),
            DocumentBody::Tree(_) => None,
        }
    }

    /// The merged tree; `None` for opaque documents
    pub fn root(&self) -> Option<&DocumentNode> {
        match &self.body {
            DocumentBody::Tree(root) => Some(root),
            DocumentBody::Opaque { .. } => None,
        }
    }

    pub fn get(&self, path: &NodePath) -> Option<&DocumentNode> {
        self.root()?.at(path)
    }

    pub fn describe(&self, path: &NodePath) -> Option<&PropertyDescriptor> {
        self.get(path)?.descriptor.as_ref()
    }

    /// Apply one already-validated op and re-derive annotations.
    ///
    /// Only the command stack calls this; mutating the tree behind the
    /// stack's back would corrupt undo.
    pub(crate) fn apply_op(&mut self, op: &EditOp) -> Result<(), MutationError> {
        let affected = op.affected_path();
        self.apply_structural(op)?;
        self.materialize_along(&affected);

        match affected.first() {
            Some(Step::Member(name)) if !op.is_shape_changing() => {
                let name = name.clone();
                self.recompute_member(&name);
            }
            _ => self.recompute_full(),
        }

        self.version += 1;
        debug!(path = %self.path, op = op.name(), version = self.version, "op applied");
        Ok(())
    }

    fn root_mut(&mut self) -> Result<&mut DocumentNode, MutationError> {
        match &mut self.body {
            DocumentBody::Tree(root) => Ok(root),
            DocumentBody::Opaque { .. } => Err(MutationError::OpaqueDocument),
        }
    }

    fn apply_structural(&mut self, op: &EditOp) -> Result<(), MutationError> {
        let root = self.root_mut()?;
        match op {
            EditOp::SetScalar { path, value } => {
                let node = root
                    .at_mut(path)
                    .ok_or_else(|| MutationError::PathNotFound { path: path.clone() })?;
                match &mut node.content {
                    NodeContent::Scalar(slot) => *slot = value.clone(),
                    _ => return Err(MutationError::NotAScalar { path: path.clone() }),
                }
                node.provenance = Provenance::Overridden;
                Ok(())
            }

            EditOp::Replace { path, value } => {
                if path.is_root() {
                    *root = DocumentNode::from_value(value);
                    return Ok(());
                }
                let parent_path = path.parent().expect("non-root path has a parent");
                let parent = root
                    .at_mut(&parent_path)
                    .ok_or_else(|| MutationError::PathNotFound { path: parent_path.clone() })?;
                match (path.last(), &mut parent.content) {
                    (Some(Step::Member(name)), NodeContent::Object(members)) => {
                        match members.iter_mut().find(|(member, _)| member == name) {
                            Some((_, node)) => *node = DocumentNode::from_value(value),
                            None => members.push((name.clone(), DocumentNode::from_value(value))),
                        }
                        Ok(())
                    }
                    (Some(Step::Index(index)), NodeContent::Array(elements)) => {
                        let len = elements.len();
                        let slot = elements.get_mut(*index).ok_or(
                            MutationError::IndexOutOfBounds {
                                path: parent_path.clone(),
                                index: *index,
                                len,
                            },
                        )?;
                        *slot = DocumentNode::from_value(value);
                        Ok(())
                    }
                    _ => Err(MutationError::PathNotFound { path: path.clone() }),
                }
            }

            EditOp::InsertMember {
                parent,
                name,
                value,
            } => {
                let parent_node = root
                    .at_mut(parent)
                    .ok_or_else(|| MutationError::PathNotFound { path: parent.clone() })?;
                match &mut parent_node.content {
                    NodeContent::Object(members) => {
                        if members.iter().any(|(member, _)| member == name) {
                            return Err(MutationError::DuplicateMember {
                                path: parent.clone(),
                                name: name.clone(),
                            });
                        }
                        members.push((name.clone(), DocumentNode::from_value(value)));
                        Ok(())
                    }
                    _ => Err(MutationError::NotAnObject { path: parent.clone() }),
                }
            }

            EditOp::RemoveMember { parent, name } => {
                let parent_node = root
                    .at_mut(parent)
                    .ok_or_else(|| MutationError::PathNotFound { path: parent.clone() })?;
                match &mut parent_node.content {
                    NodeContent::Object(members) => {
                        let position = members
                            .iter()
                            .position(|(member, _)| member == name)
                            .ok_or_else(|| MutationError::PathNotFound {
                                path: parent.clone().child(name.clone()),
                            })?;
                        members.remove(position);
                        Ok(())
                    }
                    _ => Err(MutationError::NotAnObject { path: parent.clone() }),
                }
            }

            EditOp::InsertElement {
                parent,
                index,
                value,
            } => {
                let parent_node = root
                    .at_mut(parent)
                    .ok_or_else(|| MutationError::PathNotFound { path: parent.clone() })?;
                match &mut parent_node.content {
                    NodeContent::Array(elements) => {
                        if *index > elements.len() {
                            return Err(MutationError::IndexOutOfBounds {
                                path: parent.clone(),
                                index: *index,
                                len: elements.len(),
                            });
                        }
                        elements.insert(*index, DocumentNode::from_value(value));
                        Ok(())
                    }
                    _ => Err(MutationError::NotAnArray { path: parent.clone() }),
                }
            }

            EditOp::RemoveElement { parent, index } => {
                let parent_node = root
                    .at_mut(parent)
                    .ok_or_else(|| MutationError::PathNotFound { path: parent.clone() })?;
                match &mut parent_node.content {
                    NodeContent::Array(elements) => {
                        if *index >= elements.len() {
                            return Err(MutationError::IndexOutOfBounds {
                                path: parent.clone(),
                                index: *index,
                                len: elements.len(),
                            });
                        }
                        elements.remove(*index);
                        Ok(())
                    }
                    _ => Err(MutationError::NotAnArray { path: parent.clone() }),
                }
            }
        }
    }

    /// Mark schema-defaulted nodes along an edited path as stored, so the
    /// recompute projection includes the edit's whole ancestry.
    fn materialize_along(&mut self, path: &NodePath) {
        let Ok(root) = self.root_mut() else { return };
        let mut current = root;
        for step in path.steps() {
            let Some(next) = (match step {
                Step::Member(name) => current.member_mut(name),
                Step::Index(index) => match &mut current.content {
                    NodeContent::Array(elements) => elements.get_mut(*index),
                    _ => None,
                },
            }) else {
                return;
            };
            if next.provenance == Provenance::Default {
                next.provenance = Provenance::Overridden;
            }
            current = next;
        }
    }

    /// Re-derive the whole tree from (base, projection, schema)
    fn recompute_full(&mut self) {
        let DocumentBody::Tree(root) = &self.body else {
            return;
        };
        let projection = root.effective_value();
        self.body = DocumentBody::Tree(build_root(
            self.base.as_ref(),
            projection.as_ref(),
            self.schema.as_ref(),
        ));
    }

    /// Re-derive one root member's subtree, leaving its siblings alone
    fn recompute_member(&mut self, name: &str) {
        let root_is_object = matches!(
            &self.body,
            DocumentBody::Tree(root) if matches!(root.content, NodeContent::Object(_))
        );
        if !root_is_object {
            self.recompute_full();
            return;
        }
        let DocumentBody::Tree(root) = &mut self.body else {
            return;
        };
        let NodeContent::Object(members) = &mut root.content else {
            return;
        };

        let base_member = self
            .base
            .as_ref()
            .and_then(|base| base.member(name));
        let (member_schema, member_descriptor) =
            member_annotation(self.schema.as_ref(), name);

        match members.iter().position(|(member, _)| member == name) {
            Some(position) => {
                let projection = members[position].1.effective_value();
                if projection.is_none() && base_member.is_none() {
                    if let Some(member_schema) = member_schema {
                        members[position].1 =
                            synthesize_default(Some(member_schema), member_descriptor, 1);
                    } else {
                        members.remove(position);
                    }
                } else {
                    members[position].1 = build_node(
                        projection.as_ref(),
                        base_member,
                        member_schema,
                        member_descriptor,
                        1,
                    );
                }
            }
            None => {
                // Removed from the tree; base or schema may bring it back.
                if base_member.is_some() {
                    members.push((
                        name.to_string(),
                        build_node(None, base_member, member_schema, member_descriptor, 1),
                    ));
                } else if let Some(member_schema) = member_schema {
                    members.push((
                        name.to_string(),
                        synthesize_default(Some(member_schema), member_descriptor, 1),
                    ));
                }
            }
        }

        root.provenance = if self.base.is_none() {
            Provenance::Overridden
        } else if members
            .iter()
            .any(|(_, node)| node.provenance == Provenance::Overridden)
        {
            Provenance::Overridden
        } else {
            Provenance::Inherited
        };
    }

    /// Serialize the overlay delta: members equal to the inherited base
    /// value are omitted unless the schema marks them always-write; a
    /// document that is pure inheritance keeps (or regains) a clean
    /// overlay with no file at all.
    pub fn save(&self, resolver: &mut OverlayResolver) -> Result<SaveOutcome, EditorError> {
        match &self.body {
            DocumentBody::Opaque { raw, origin } => {
                if *origin == Origin::Overlay {
                    resolver.write_overlay(&self.path, raw)?;
                    debug!(path = %self.path, "opaque overlay text saved verbatim");
                    Ok(SaveOutcome::Written)
                } else {
                    Ok(SaveOutcome::NoOverlay)
                }
            }
            DocumentBody::Tree(root) => {
                let (changed, value) = delta_node(root, self.base.as_ref());
                if changed {
                    let value = value.expect("a changed delta always carries a value");
                    resolver.write_overlay(&self.path, &to_json_pretty(&value))?;
                    debug!(path = %self.path, "overlay delta saved");
                    Ok(SaveOutcome::Written)
                } else if resolver.overlay_exists(&self.path) {
                    resolver.remove_overlay_file(&self.path)?;
                    debug!(path = %self.path, "pure inheritance; overlay file removed");
                    Ok(SaveOutcome::RemovedOverlay)
                } else {
                    Ok(SaveOutcome::NoOverlay)
                }
            }
        }
    }
}

/// Delta extraction: `(anything actually changed, value to emit)`.
///
/// Always-write members are emitted without counting as changes, so a
/// document whose only emissions are always-write stays fileless.
fn delta_node(node: &DocumentNode, base: Option<&Value>) -> (bool, Option<Value>) {
    let always_write = node
        .descriptor
        .as_ref()
        .is_some_and(|descriptor| descriptor.always_write);

    if node.provenance == Provenance::Default {
        if always_write {
            return (false, Some(node.to_value()));
        }
        return (false, None);
    }

    match &node.content {
        NodeContent::Scalar(scalar) => {
            let value = Value::Scalar(scalar.clone());
            if base == Some(&value) {
                (false, always_write.then_some(value))
            } else {
                (true, Some(value))
            }
        }

        NodeContent::Array(_) => {
            let value = node
                .effective_value()
                .expect("non-default node has an effective value");
            if base == Some(&value) {
                (false, always_write.then_some(value))
            } else {
                (true, Some(value))
            }
        }

        NodeContent::Object(members) => {
            let base_members = base.and_then(Value::as_object);
            if base_members.is_none() {
                // Absent (or shape-changed) in base: the object is new.
                let value = node
                    .effective_value()
                    .expect("non-default node has an effective value");
                return (true, Some(value));
            }

            let mut changed = false;
            let mut emitted: Vec<(String, Value)> = Vec::new();
            for (name, member) in members {
                let member_base = base.and_then(|value| value.member(name));
                let (member_changed, member_value) = delta_node(member, member_base);
                changed |= member_changed;
                if let Some(member_value) = member_value {
                    emitted.push((name.clone(), member_value));
                }
            }

            if emitted.is_empty() && !changed {
                (false, always_write.then(|| Value::Object(Vec::new())))
            } else {
                (changed, Some(Value::Object(emitted)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modforge_common::MockFileSystem;
    use modforge_data::Scalar;
    use modforge_schema::SchemaRegistry;

    fn fixture(overlay: Option<&str>) -> (OverlayResolver, SchemaRegistry) {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/base/entities/fighter.entity",
            "{\n    \"hull\": 100,\n    \"shield\": 50\n}\n",
        );
        if let Some(text) = overlay {
            fs.add_file("/mod/entities/fighter.entity", text);
        }
        let resolver = OverlayResolver::with_filesystem("/base", "/mod", Box::new(fs)).unwrap();

        let mut schemas = SchemaRegistry::new();
        schemas.insert(
            "unit",
            serde_json::from_str(
                r#"{
                    "kind": "object",
                    "members": [
                        {"name": "hull", "required": true, "schema": {"kind": "number"}},
                        {"name": "shield", "schema": {"kind": "number"}},
                        {"name": "crew", "schema": {"kind": "integer", "default": 4}}
                    ]
                }"#,
            )
            .unwrap(),
        );
        (resolver, schemas)
    }

    fn fighter() -> LogicalPath {
        LogicalPath::new("entities/fighter.entity")
    }

    #[test]
    fn test_load_merges_and_tags() {
        let (resolver, schemas) = fixture(Some("{\n    \"hull\": 120\n}\n"));
        let doc = Document::load(&resolver, &schemas, fighter(), "unit").unwrap();

        let root = doc.root().unwrap();
        assert_eq!(root.provenance, Provenance::Overridden);
        assert_eq!(
            root.member("hull").unwrap().provenance,
            Provenance::Overridden
        );
        assert_eq!(
            root.member("shield").unwrap().provenance,
            Provenance::Inherited
        );
        assert_eq!(
            root.member("crew").unwrap().provenance,
            Provenance::Default
        );
        assert!(doc
            .describe(&NodePath::root().child("hull"))
            .unwrap()
            .required);
    }

    #[test]
    fn test_save_writes_only_the_delta() {
        let (mut resolver, schemas) = fixture(None);
        let mut doc = Document::load(&resolver, &schemas, fighter(), "unit").unwrap();

        doc.apply_op(&EditOp::SetScalar {
            path: NodePath::root().child("hull"),
            value: Scalar::Int(140),
        })
        .unwrap();

        assert_eq!(doc.save(&mut resolver).unwrap(), SaveOutcome::Written);
        let written = resolver.read(&fighter()).unwrap();
        assert_eq!(written, "{\n    \"hull\": 140\n}\n");
    }

    #[test]
    fn test_save_pure_inheritance_removes_overlay() {
        let (mut resolver, schemas) = fixture(Some("{\n    \"hull\": 120\n}\n"));
        let mut doc = Document::load(&resolver, &schemas, fighter(), "unit").unwrap();

        // set the override back to the inherited value
        doc.apply_op(&EditOp::SetScalar {
            path: NodePath::root().child("hull"),
            value: Scalar::Int(100),
        })
        .unwrap();

        assert_eq!(
            doc.save(&mut resolver).unwrap(),
            SaveOutcome::RemovedOverlay
        );
        assert!(!resolver.overlay_exists(&fighter()));
        // nothing was ever stored in the overlay, nothing to save again
        assert_eq!(doc.save(&mut resolver).unwrap(), SaveOutcome::NoOverlay);
    }

    #[test]
    fn test_untouched_load_saves_byte_identically() {
        let overlay = "{\n    \"hull\": 120\n}\n";
        let (mut resolver, schemas) = fixture(Some(overlay));
        let doc = Document::load(&resolver, &schemas, fighter(), "unit").unwrap();

        assert_eq!(doc.save(&mut resolver).unwrap(), SaveOutcome::Written);
        assert_eq!(resolver.read(&fighter()).unwrap(), overlay);
    }

    #[test]
    fn test_malformed_overlay_degrades_to_opaque() {
        let (mut resolver, schemas) = fixture(Some("{\"hull\": "));
        let mut doc = Document::load(&resolver, &schemas, fighter(), "unit").unwrap();

        assert!(doc.is_opaque());
        assert_eq!(doc.raw_text(), Some("{\"hull\": "));

        let err = doc
            .apply_op(&EditOp::SetScalar {
                path: NodePath::root().child("hull"),
                value: Scalar::Int(1),
            })
            .unwrap_err();
        assert_eq!(err, MutationError::OpaqueDocument);

        // raw text round-trips verbatim
        assert_eq!(doc.save(&mut resolver).unwrap(), SaveOutcome::Written);
        assert_eq!(resolver.read(&fighter()).unwrap(), "{\"hull\": ");
    }

    #[test]
    fn test_always_write_member_rides_along() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/base/uniforms/combat.uniforms",
            "{\n    \"speed\": 10,\n    \"version\": 3\n}\n",
        );
        let mut resolver =
            OverlayResolver::with_filesystem("/base", "/mod", Box::new(fs)).unwrap();
        let mut schemas = SchemaRegistry::new();
        schemas.insert(
            "uniforms",
            serde_json::from_str(
                r#"{
                    "kind": "object",
                    "members": [
                        {"name": "speed", "schema": {"kind": "number"}},
                        {"name": "version", "always_write": true, "schema": {"kind": "integer"}}
                    ]
                }"#,
            )
            .unwrap(),
        );

        let path = LogicalPath::new("uniforms/combat.uniforms");
        let mut doc = Document::load(&resolver, &schemas, path.clone(), "uniforms").unwrap();

        // untouched: always-write alone does not conjure an overlay file
        assert_eq!(doc.save(&mut resolver).unwrap(), SaveOutcome::NoOverlay);

        doc.apply_op(&EditOp::SetScalar {
            path: NodePath::root().child("speed"),
            value: Scalar::Int(12),
        })
        .unwrap();
        assert_eq!(doc.save(&mut resolver).unwrap(), SaveOutcome::Written);
        let written = resolver.read(&path).unwrap();
        assert_eq!(written, "{\n    \"speed\": 12,\n    \"version\": 3\n}\n");
    }
}

