//! Edit operations.
//!
//! Each operation validates against the current tree and schema before
//! anything is touched, and knows how to produce its inverse against the
//! pre-edit state. A rejected operation leaves the document unchanged.
//!
//! Operation semantics:
//!
//! - `SetScalar` — atomic replacement of a leaf value
//! - `Replace` — put a whole subtree at a path; inserting a member that
//!   does not exist yet is allowed, which also makes it the inverse of
//!   removing an inherited member (the base value resurfaces on removal,
//!   so the inverse must overwrite rather than insert)
//! - `InsertMember` / `RemoveMember` — add or take away an object member;
//!   at the document root these change document shape
//! - `InsertElement` / `RemoveElement` — positional array edits
//!
//! Editing inside a schema-defaulted subtree materializes it into the
//! overlay projection; the computed inverse removes the materialized
//! ancestor again so undo restores the defaulted state exactly.

use thiserror::Error;

use modforge_data::{NodePath, Scalar, Step, Value};

use crate::document::Document;
use crate::node::{DocumentNode, Provenance};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("no node at '{path}'")]
    PathNotFound { path: NodePath },

    #[error("node at '{path}' is not an object")]
    NotAnObject { path: NodePath },

    #[error("node at '{path}' is not an array")]
    NotAnArray { path: NodePath },

    #[error("node at '{path}' is not a scalar")]
    NotAScalar { path: NodePath },

    #[error("'{path}' is read-only")]
    ReadOnly { path: NodePath },

    #[error("object at '{path}' does not accept undeclared members")]
    ClosedObject { path: NodePath },

    #[error("member '{name}' already exists at '{path}'")]
    DuplicateMember { path: NodePath, name: String },

    #[error("member '{name}' at '{path}' is schema-supplied and holds no stored value")]
    DefaultMember { path: NodePath, name: String },

    #[error("index {index} out of bounds at '{path}' (length {len})")]
    IndexOutOfBounds {
        path: NodePath,
        index: usize,
        len: usize,
    },

    #[error("{found} value not allowed at '{path}' (schema expects {expected})")]
    KindMismatch {
        path: NodePath,
        expected: &'static str,
        found: &'static str,
    },

    #[error("'{value}' is not among the allowed options at '{path}'")]
    InvalidOption { path: NodePath, value: String },

    #[error("document failed to parse and is held as raw text; structural edits are unavailable")]
    OpaqueDocument,
}

/// One document mutation
#[derive(Debug, Clone, PartialEq)]
pub enum EditOp {
    /// Replace a leaf value in place
    SetScalar { path: NodePath, value: Scalar },

    /// Put a whole subtree at a path (overwrite, or insert a missing member)
    Replace { path: NodePath, value: Value },

    /// Add a new member to an object
    InsertMember {
        parent: NodePath,
        name: String,
        value: Value,
    },

    /// Take a member out of an object; a base-backed member resurfaces
    /// with its inherited value, a declared one with its schema default
    RemoveMember { parent: NodePath, name: String },

    /// Insert an array element at an index
    InsertElement {
        parent: NodePath,
        index: usize,
        value: Value,
    },

    /// Remove the array element at an index
    RemoveElement { parent: NodePath, index: usize },
}

impl EditOp {
    pub fn name(&self) -> &'static str {
        match self {
            EditOp::SetScalar { .. } => "set_scalar",
            EditOp::Replace { .. } => "replace",
            EditOp::InsertMember { .. } => "insert_member",
            EditOp::RemoveMember { .. } => "remove_member",
            EditOp::InsertElement { .. } => "insert_element",
            EditOp::RemoveElement { .. } => "remove_element",
        }
    }

    /// The node this operation targets or creates
    pub fn affected_path(&self) -> NodePath {
        match self {
            EditOp::SetScalar { path, .. } | EditOp::Replace { path, .. } => path.clone(),
            EditOp::InsertMember { parent, name, .. } | EditOp::RemoveMember { parent, name } => {
                parent.clone().child(name.clone())
            }
            EditOp::InsertElement { parent, index, .. }
            | EditOp::RemoveElement { parent, index } => parent.clone().element(*index),
        }
    }

    /// Whether this operation changes document shape: adding or removing a
    /// root-level member (or replacing the root) invalidates the whole
    /// descriptor/provenance annotation, not just one subtree.
    pub fn is_shape_changing(&self) -> bool {
        match self {
            EditOp::Replace { path, .. } => path.is_root(),
            EditOp::InsertMember { parent, .. } | EditOp::RemoveMember { parent, .. } => {
                parent.is_root()
            }
            _ => false,
        }
    }

    /// Check this operation against the current tree and schema.
    /// Nothing is modified; errors describe why the edit is impossible.
    pub fn validate(&self, doc: &Document) -> Result<(), MutationError> {
        let root = doc.root().ok_or(MutationError::OpaqueDocument)?;
        match self {
            EditOp::SetScalar { path, value } => {
                let node = root
                    .at(path)
                    .ok_or_else(|| MutationError::PathNotFound { path: path.clone() })?;
                if !node.is_scalar() {
                    return Err(MutationError::NotAScalar { path: path.clone() });
                }
                if let Some(descriptor) = &node.descriptor {
                    if descriptor.read_only {
                        return Err(MutationError::ReadOnly { path: path.clone() });
                    }
                    let candidate = Value::Scalar(value.clone());
                    if !descriptor.kind.admits(&candidate) {
                        return Err(MutationError::KindMismatch {
                            path: path.clone(),
                            expected: descriptor.kind.as_str(),
                            found: candidate.kind_name(),
                        });
                    }
                    if let (Some(options), Scalar::Str(text)) = (&descriptor.options, value) {
                        if !options.contains(text) {
                            return Err(MutationError::InvalidOption {
                                path: path.clone(),
                                value: text.clone(),
                            });
                        }
                    }
                }
                Ok(())
            }

            EditOp::Replace { path, value } => {
                if let Some(node) = root.at(path) {
                    if let Some(descriptor) = &node.descriptor {
                        if descriptor.read_only {
                            return Err(MutationError::ReadOnly { path: path.clone() });
                        }
                        if !descriptor.kind.admits(value) {
                            return Err(MutationError::KindMismatch {
                                path: path.clone(),
                                expected: descriptor.kind.as_str(),
                                found: value.kind_name(),
                            });
                        }
                    }
                    return Ok(());
                }
                // Whole-subtree insertion: the parent must be an open object.
                let Some(Step::Member(_)) = path.last() else {
                    return Err(MutationError::PathNotFound { path: path.clone() });
                };
                let parent_path = path.parent().expect("non-root path has a parent");
                let parent = root
                    .at(&parent_path)
                    .ok_or_else(|| MutationError::PathNotFound { path: parent_path.clone() })?;
                if parent.members().is_none() {
                    return Err(MutationError::NotAnObject { path: parent_path });
                }
                Self::check_open_object(parent, &parent_path)
            }

            EditOp::InsertMember {
                parent, name, ..
            } => {
                let parent_node = root
                    .at(parent)
                    .ok_or_else(|| MutationError::PathNotFound { path: parent.clone() })?;
                if parent_node.members().is_none() {
                    return Err(MutationError::NotAnObject { path: parent.clone() });
                }
                Self::check_open_object(parent_node, parent)?;
                if parent_node.member(name).is_some() {
                    return Err(MutationError::DuplicateMember {
                        path: parent.clone(),
                        name: name.clone(),
                    });
                }
                Ok(())
            }

            EditOp::RemoveMember { parent, name } => {
                let parent_node = root
                    .at(parent)
                    .ok_or_else(|| MutationError::PathNotFound { path: parent.clone() })?;
                if parent_node.members().is_none() {
                    return Err(MutationError::NotAnObject { path: parent.clone() });
                }
                let member = parent_node.member(name).ok_or_else(|| MutationError::PathNotFound {
                    path: parent.clone().child(name.clone()),
                })?;
                if member.descriptor.as_ref().is_some_and(|d| d.read_only) {
                    return Err(MutationError::ReadOnly {
                        path: parent.clone().child(name.clone()),
                    });
                }
                if member.provenance == Provenance::Default {
                    return Err(MutationError::DefaultMember {
                        path: parent.clone(),
                        name: name.clone(),
                    });
                }
                Ok(())
            }

            EditOp::InsertElement { parent, index, .. } => {
                let (len, _) = Self::array_target(root, parent)?;
                if *index > len {
                    return Err(MutationError::IndexOutOfBounds {
                        path: parent.clone(),
                        index: *index,
                        len,
                    });
                }
                Ok(())
            }

            EditOp::RemoveElement { parent, index } => {
                let (len, _) = Self::array_target(root, parent)?;
                if *index >= len {
                    return Err(MutationError::IndexOutOfBounds {
                        path: parent.clone(),
                        index: *index,
                        len,
                    });
                }
                Ok(())
            }
        }
    }

    /// Produce the operation that undoes this one, computed against the
    /// pre-edit tree.
    pub(crate) fn inverse(&self, doc: &Document) -> Result<EditOp, MutationError> {
        let root = doc.root().ok_or(MutationError::OpaqueDocument)?;

        // Editing inside a defaulted subtree materializes it; undo must
        // take the materialized ancestor back out, not restore values.
        let anchor = match self {
            EditOp::SetScalar { path, .. } | EditOp::Replace { path, .. } => path.clone(),
            EditOp::InsertMember { parent, .. }
            | EditOp::RemoveMember { parent, .. }
            | EditOp::InsertElement { parent, .. }
            | EditOp::RemoveElement { parent, .. } => parent.clone(),
        };
        if let Some((parent, name)) = first_defaulted_on_path(root, &anchor) {
            return Ok(EditOp::RemoveMember { parent, name });
        }

        match self {
            EditOp::SetScalar { path, .. } => {
                let node = root
                    .at(path)
                    .ok_or_else(|| MutationError::PathNotFound { path: path.clone() })?;
                let old = node
                    .as_scalar()
                    .ok_or_else(|| MutationError::NotAScalar { path: path.clone() })?;
                Ok(EditOp::SetScalar {
                    path: path.clone(),
                    value: old.clone(),
                })
            }

            EditOp::Replace { path, .. } => match root.at(path) {
                Some(node) => Ok(EditOp::Replace {
                    path: path.clone(),
                    value: stored_value(node),
                }),
                None => {
                    let parent = path.parent().expect("validated: insertions are non-root");
                    let Some(Step::Member(name)) = path.last() else {
                        return Err(MutationError::PathNotFound { path: path.clone() });
                    };
                    Ok(EditOp::RemoveMember {
                        parent,
                        name: name.clone(),
                    })
                }
            },

            EditOp::InsertMember { parent, name, .. } => Ok(EditOp::RemoveMember {
                parent: parent.clone(),
                name: name.clone(),
            }),

            EditOp::RemoveMember { parent, name } => {
                let member = root
                    .at(parent)
                    .and_then(|node| node.member(name))
                    .ok_or_else(|| MutationError::PathNotFound {
                        path: parent.clone().child(name.clone()),
                    })?;
                Ok(EditOp::Replace {
                    path: parent.clone().child(name.clone()),
                    value: stored_value(member),
                })
            }

            EditOp::InsertElement { parent, index, .. } => Ok(EditOp::RemoveElement {
                parent: parent.clone(),
                index: *index,
            }),

            EditOp::RemoveElement { parent, index } => {
                let element = root
                    .at(parent)
                    .and_then(|node| node.elements()?.get(*index))
                    .ok_or_else(|| MutationError::PathNotFound {
                        path: parent.clone().element(*index),
                    })?;
                Ok(EditOp::InsertElement {
                    parent: parent.clone(),
                    index: *index,
                    value: stored_value(element),
                })
            }
        }
    }

    fn check_open_object(node: &DocumentNode, path: &NodePath) -> Result<(), MutationError> {
        if let Some(descriptor) = &node.descriptor {
            if descriptor.read_only {
                return Err(MutationError::ReadOnly { path: path.clone() });
            }
            if descriptor.closed {
                return Err(MutationError::ClosedObject { path: path.clone() });
            }
        }
        Ok(())
    }

    fn array_target<'n>(
        root: &'n DocumentNode,
        parent: &NodePath,
    ) -> Result<(usize, &'n DocumentNode), MutationError> {
        let node = root
            .at(parent)
            .ok_or_else(|| MutationError::PathNotFound { path: parent.clone() })?;
        let elements = node
            .elements()
            .ok_or_else(|| MutationError::NotAnArray { path: parent.clone() })?;
        if node.descriptor.as_ref().is_some_and(|d| d.read_only) {
            return Err(MutationError::ReadOnly { path: parent.clone() });
        }
        Ok((elements.len(), node))
    }
}

/// Restore value for inverses: what the layers actually store, with
/// schema-defaulted descendants pruned so undo re-synthesizes them.
fn stored_value(node: &DocumentNode) -> Value {
    node.effective_value().unwrap_or_else(|| node.to_value())
}

/// First schema-defaulted node along a path, as (parent, member name)
fn first_defaulted_on_path(
    root: &DocumentNode,
    path: &NodePath,
) -> Option<(NodePath, String)> {
    let mut current = root;
    let mut walked = NodePath::root();
    for step in path.steps() {
        let next = match step {
            Step::Member(name) => current.member(name)?,
            Step::Index(index) => current.elements()?.get(*index)?,
        };
        if next.provenance == Provenance::Default {
            // Only members are ever synthesized, so the defaulted node is
            // always addressed by name.
            if let Step::Member(name) = step {
                return Some((walked, name.clone()));
            }
            return None;
        }
        walked = match step {
            Step::Member(name) => walked.child(name.clone()),
            Step::Index(index) => walked.element(*index),
        };
        current = next;
    }
    None
}
