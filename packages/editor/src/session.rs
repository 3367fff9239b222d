//! # Mod Session
//!
//! One open mod: the explicitly constructed context that everything else
//! hangs off. Owns the overlay resolver and schema registry (shared,
//! read-only across documents) and one document + command stack pair per
//! open file.
//!
//! The session is single-writer: mutation, undo/redo, and save for a
//! document happen on one logical sequence, serialized by the embedding
//! shell. Background work (asset scans, previews) must hand results back
//! to that sequence instead of touching session state itself.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, info};

use modforge_common::RealFileSystem;
use modforge_data::NodePath;
use modforge_overlay::{DataCategory, LogicalPath, ManifestIssue, OverlayResolver};
use modforge_schema::{PropertyDescriptor, ReferenceKind, SchemaRegistry};

use crate::document::{Document, SaveOutcome};
use crate::errors::EditorError;
use crate::events::{DocumentChanged, EventBus, SubscriberId};
use crate::mutations::EditOp;
use crate::references::{self, ReferenceTarget};
use crate::undo_stack::{CommandStack, Transaction};

/// Everything needed to open a mod; built by the embedding shell,
/// one per session, no global state.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub base_root: PathBuf,
    pub mod_root: PathBuf,
    pub schema_root: PathBuf,
}

struct OpenDocument {
    document: Document,
    stack: CommandStack,
    dirty: bool,
}

/// One open mod and its documents
pub struct ModSession {
    resolver: OverlayResolver,
    schemas: SchemaRegistry,
    docs: HashMap<LogicalPath, OpenDocument>,
    events: EventBus,
}

impl ModSession {
    pub fn open(config: SessionConfig) -> Result<Self, EditorError> {
        let resolver = OverlayResolver::open(config.base_root, config.mod_root)?;
        let schemas = SchemaRegistry::load_dir(&RealFileSystem, &config.schema_root)?;
        info!(
            schemas = schemas.len(),
            manifested = resolver.manifest().len(),
            "mod session opened"
        );
        Ok(Self::with_parts(resolver, schemas))
    }

    /// Assemble from prebuilt parts (tests, embedded tooling)
    pub fn with_parts(resolver: OverlayResolver, schemas: SchemaRegistry) -> Self {
        Self {
            resolver,
            schemas,
            docs: HashMap::new(),
            events: EventBus::new(),
        }
    }

    pub fn resolver(&self) -> &OverlayResolver {
        &self.resolver
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    // ---- document lifecycle ----

    /// Open (load and merge) a document; reopening an already open path
    /// returns the live instance rather than reloading it.
    pub fn open_document(
        &mut self,
        path: impl Into<LogicalPath>,
        kind: &str,
    ) -> Result<&Document, EditorError> {
        let path = path.into();
        if !self.docs.contains_key(&path) {
            let document =
                Document::load(&self.resolver, &self.schemas, path.clone(), kind)?;
            self.docs.insert(
                path.clone(),
                OpenDocument {
                    document,
                    stack: CommandStack::new(),
                    dirty: false,
                },
            );
        }
        Ok(&self.docs[&path].document)
    }

    /// Drop a document and its history; unsaved changes are discarded
    pub fn close_document(&mut self, path: &LogicalPath) -> bool {
        let closed = self.docs.remove(path).is_some();
        if closed {
            debug!(%path, "document closed");
        }
        closed
    }

    pub fn is_open(&self, path: &LogicalPath) -> bool {
        self.docs.contains_key(path)
    }

    pub fn open_documents(&self) -> impl Iterator<Item = &LogicalPath> {
        self.docs.keys()
    }

    pub fn document(&self, path: &LogicalPath) -> Result<&Document, EditorError> {
        self.docs
            .get(path)
            .map(|entry| &entry.document)
            .ok_or_else(|| EditorError::DocumentNotOpen { path: path.clone() })
    }

    /// The undo/redo history of one open document
    pub fn history(&self, path: &LogicalPath) -> Result<&CommandStack, EditorError> {
        self.docs
            .get(path)
            .map(|entry| &entry.stack)
            .ok_or_else(|| EditorError::DocumentNotOpen { path: path.clone() })
    }

    // ---- editing ----

    /// Begin a transaction on one document. The borrow it holds keeps it
    /// the only writer until it commits, cancels, or drops.
    pub fn edit(&mut self, path: &LogicalPath) -> Result<Transaction<'_>, EditorError> {
        let entry = self
            .docs
            .get_mut(path)
            .ok_or_else(|| EditorError::DocumentNotOpen { path: path.clone() })?;
        Ok(Transaction::new(
            &mut entry.document,
            &mut entry.stack,
            &mut self.events,
            &mut entry.dirty,
            path.clone(),
        ))
    }

    /// One-op convenience edit
    pub fn apply(&mut self, path: &LogicalPath, op: EditOp) -> Result<(), EditorError> {
        let mut tx = self.edit(path)?;
        tx.push(op)?;
        tx.commit();
        Ok(())
    }

    /// Undo one command. `Ok(false)` with no event at the bottom of history.
    pub fn undo(&mut self, path: &LogicalPath) -> Result<bool, EditorError> {
        let entry = self
            .docs
            .get_mut(path)
            .ok_or_else(|| EditorError::DocumentNotOpen { path: path.clone() })?;
        let shape_changed = entry
            .stack
            .peek_undo()
            .map(|command| command.shape_changed())
            .unwrap_or(false);
        let undone = entry.stack.undo(&mut entry.document)?;
        if undone {
            entry.dirty = true;
            self.events.emit(&DocumentChanged {
                path: path.clone(),
                shape_changed,
            });
        }
        Ok(undone)
    }

    /// Redo one command. `Ok(false)` with no event at the top of history.
    pub fn redo(&mut self, path: &LogicalPath) -> Result<bool, EditorError> {
        let entry = self
            .docs
            .get_mut(path)
            .ok_or_else(|| EditorError::DocumentNotOpen { path: path.clone() })?;
        let shape_changed = entry
            .stack
            .peek_redo()
            .map(|command| command.shape_changed())
            .unwrap_or(false);
        let redone = entry.stack.redo(&mut entry.document)?;
        if redone {
            entry.dirty = true;
            self.events.emit(&DocumentChanged {
                path: path.clone(),
                shape_changed,
            });
        }
        Ok(redone)
    }

    // ---- persistence ----

    pub fn save(&mut self, path: &LogicalPath) -> Result<SaveOutcome, EditorError> {
        let entry = self
            .docs
            .get_mut(path)
            .ok_or_else(|| EditorError::DocumentNotOpen { path: path.clone() })?;
        let outcome = entry.document.save(&mut self.resolver)?;
        entry.dirty = false;
        Ok(outcome)
    }

    pub fn save_all(&mut self) -> Result<(), EditorError> {
        for entry in self.docs.values_mut() {
            if entry.dirty {
                entry.document.save(&mut self.resolver)?;
                entry.dirty = false;
            }
        }
        Ok(())
    }

    /// Documents with committed-but-unsaved changes
    pub fn modified_documents(&self) -> Vec<LogicalPath> {
        let mut modified: Vec<LogicalPath> = self
            .docs
            .iter()
            .filter(|(_, entry)| entry.dirty)
            .map(|(path, _)| path.clone())
            .collect();
        modified.sort();
        modified
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.docs.values().any(|entry| entry.dirty)
    }

    // ---- schema and reference queries ----

    pub fn describe(
        &self,
        path: &LogicalPath,
        node: &NodePath,
    ) -> Result<Option<&PropertyDescriptor>, EditorError> {
        Ok(self.document(path)?.describe(node))
    }

    /// The declared reference kind of a node, if its schema declares one
    pub fn classify(
        &self,
        path: &LogicalPath,
        node: &NodePath,
    ) -> Result<Option<ReferenceKind>, EditorError> {
        Ok(self
            .document(path)?
            .describe(node)
            .and_then(references::classify))
    }

    /// Candidates matching a reference-typed node's current value.
    /// Empty when the node is not a reference, not a string, or simply
    /// points at nothing that exists — an unresolved reference renders,
    /// it does not fail.
    pub fn resolve_references(
        &self,
        path: &LogicalPath,
        node: &NodePath,
    ) -> Result<Vec<ReferenceTarget>, EditorError> {
        let document = self.document(path)?;
        let Some(kind) = document.describe(node).and_then(references::classify) else {
            return Ok(Vec::new());
        };
        let Some(raw) = document
            .get(node)
            .and_then(|found| found.as_scalar())
            .and_then(|scalar| scalar.as_str())
        else {
            return Ok(Vec::new());
        };
        references::resolve(&self.resolver, kind, raw)
    }

    pub fn candidates(&self, kind: ReferenceKind) -> Result<Vec<ReferenceTarget>, EditorError> {
        references::candidates(&self.resolver, kind)
    }

    // ---- overlay passthrough ----

    pub fn list(&self, category: DataCategory) -> Result<Vec<LogicalPath>, EditorError> {
        Ok(self.resolver.list(category)?)
    }

    pub fn copy_from_base(
        &mut self,
        path: &LogicalPath,
        new_name: Option<&str>,
        add_to_manifest: bool,
    ) -> Result<LogicalPath, EditorError> {
        Ok(self
            .resolver
            .copy_from_base(path, new_name, add_to_manifest)?)
    }

    pub fn manifest_issues(&self) -> Result<Vec<ManifestIssue>, EditorError> {
        Ok(self.resolver.verify_manifest()?)
    }

    // ---- events ----

    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&DocumentChanged) + 'static,
    ) -> SubscriberId {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.events.unsubscribe(id)
    }
}
