//! # Modforge Editor
//!
//! The layered document engine behind the mod editor.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ overlay: base + mod trees → one namespace   │
//! └─────────────────────────────────────────────┘
//!                     ↓ raw layer text
//! ┌─────────────────────────────────────────────┐
//! │ editor: merged document model               │
//! │  - per-member merge, provenance tagging     │
//! │  - schema descriptors + default synthesis   │
//! │  - validated edit ops with inverses         │
//! │  - transactional command stack (undo/redo)  │
//! │  - delta save back into the overlay         │
//! └─────────────────────────────────────────────┘
//!                     ↓ change events
//! ┌─────────────────────────────────────────────┐
//! │ UI shell: forms, previews (not this crate)  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The merged tree is derived state**: provenance and descriptors are
//!    recomputed from (base, overlay projection, schema) after every applied
//!    op — they are never hand-set and never persisted.
//! 2. **Every write goes through a transaction**: validated, inverted,
//!    applied, and recorded as one undoable command.
//! 3. **Rejected edits change nothing**: validation happens before any
//!    state is touched, and a failed or abandoned transaction rolls back.
//! 4. **Undo/redo at the history bounds is a no-op**, never an error and
//!    never a crash.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use modforge_editor::{EditOp, ModSession, SessionConfig};
//!
//! let mut session = ModSession::open(SessionConfig {
//!     base_root: "game/data".into(),
//!     mod_root: "mods/my_mod".into(),
//!     schema_root: "game/schemas".into(),
//! })?;
//!
//! let path = session.open_document("entities/fighter.entity", "unit")?;
//!
//! let mut tx = session.edit(&path)?;
//! tx.push(EditOp::SetScalar {
//!     path: NodePath::root().child("hull"),
//!     value: 150.0.into(),
//! })?;
//! tx.commit();
//!
//! session.undo(&path)?;
//! session.save(&path)?;
//! ```

pub mod document;
pub mod errors;
pub mod events;
pub mod merge;
pub mod mutations;
pub mod node;
pub mod references;
pub mod session;
pub mod undo_stack;

pub use document::{Document, SaveOutcome};
pub use errors::EditorError;
pub use events::{DocumentChanged, EventBus, SubscriberId};
pub use mutations::{EditOp, MutationError};
pub use node::{DocumentNode, NodeContent, Provenance};
pub use references::{candidates, classify, resolve, ReferenceTarget};
pub use session::{ModSession, SessionConfig};
pub use undo_stack::{Command, CommandStack, Transaction};

// Re-export the vocabulary types callers hold alongside the engine
pub use modforge_data::{NodePath, Scalar, Step, Value};
pub use modforge_overlay::{DataCategory, LogicalPath, ManifestIssue};
pub use modforge_schema::{PropertyDescriptor, ReferenceKind};
