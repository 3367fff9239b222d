//! # Command Stack
//!
//! Linear per-document history with transactional recording.
//!
//! ## Design
//!
//! - Every edit runs inside a [`Transaction`]: ops are validated, their
//!   inverses captured against the pre-state, then applied one by one.
//! - Committing turns the staged ops into one [`Command`] at the cursor,
//!   truncating any redo tail. Cancelling (or dropping the transaction)
//!   rolls the applied ops back, leaving the document untouched.
//! - At most one transaction exists per document at a time; the mutable
//!   borrows it holds enforce that without any locking.
//! - `undo`/`redo` walk the cursor and re-apply inverse/forward ops.
//!   At the history bounds they return `false` and change nothing — over-
//!   undoing is an ordinary no-op, never a failure.
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut tx = session.edit(&path)?;
//! tx.push(EditOp::SetScalar { path: hull, value: 150.0.into() })?;
//! tx.push(EditOp::RemoveMember { parent: NodePath::root(), name: "legacy".into() })?;
//! tx.describe("rebalance fighter");
//! tx.commit();
//!
//! session.undo(&path)?; // reverts both ops as one step
//! ```

use tracing::{debug, error};

use modforge_overlay::LogicalPath;

use crate::document::Document;
use crate::events::{DocumentChanged, EventBus};
use crate::mutations::{EditOp, MutationError};

const DEFAULT_MAX_DEPTH: usize = 100;

/// One committed, invertible mutation batch
#[derive(Debug, Clone)]
pub struct Command {
    /// Forward ops, in application order
    ops: Vec<EditOp>,
    /// Inverse ops, already reversed for undo
    inverses: Vec<EditOp>,
    description: Option<String>,
    shape_changed: bool,
}

impl Command {
    pub fn ops(&self) -> &[EditOp] {
        &self.ops
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether any op in this command changes document shape
    pub fn shape_changed(&self) -> bool {
        self.shape_changed
    }
}

/// Undo/redo history for one open document
#[derive(Debug)]
pub struct CommandStack {
    /// Committed commands, oldest first
    history: Vec<Command>,
    /// Number of commands currently applied; the redo tail starts here
    cursor: usize,
    /// Maximum history depth (0 = unlimited)
    max_depth: usize,
}

impl CommandStack {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            history: Vec::new(),
            cursor: 0,
            max_depth,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.history.len()
    }

    pub fn undo_levels(&self) -> usize {
        self.cursor
    }

    pub fn redo_levels(&self) -> usize {
        self.history.len() - self.cursor
    }

    /// The command `undo` would revert next
    pub fn peek_undo(&self) -> Option<&Command> {
        self.cursor.checked_sub(1).map(|index| &self.history[index])
    }

    /// The command `redo` would re-apply next
    pub fn peek_redo(&self) -> Option<&Command> {
        self.history.get(self.cursor)
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.peek_undo().and_then(Command::description)
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.peek_redo().and_then(Command::description)
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.cursor = 0;
    }

    fn push(&mut self, command: Command) {
        // A new command invalidates everything that was undone.
        self.history.truncate(self.cursor);
        self.history.push(command);
        if self.max_depth > 0 && self.history.len() > self.max_depth {
            self.history.remove(0);
        }
        self.cursor = self.history.len();
    }

    /// Revert the command at the cursor. `Ok(false)` at the bottom of
    /// history: nothing to undo, nothing changed.
    pub fn undo(&mut self, doc: &mut Document) -> Result<bool, MutationError> {
        let Some(index) = self.cursor.checked_sub(1) else {
            return Ok(false);
        };
        for inverse in &self.history[index].inverses {
            doc.apply_op(inverse)?;
        }
        self.cursor = index;
        debug!(path = %doc.path(), remaining = self.cursor, "undo");
        Ok(true)
    }

    /// Re-apply the command after the cursor. `Ok(false)` at the top of
    /// history: nothing to redo, nothing changed.
    pub fn redo(&mut self, doc: &mut Document) -> Result<bool, MutationError> {
        if self.cursor >= self.history.len() {
            return Ok(false);
        }
        for op in &self.history[self.cursor].ops {
            doc.apply_op(op)?;
        }
        self.cursor += 1;
        debug!(path = %doc.path(), applied = self.cursor, "redo");
        Ok(true)
    }
}

impl Default for CommandStack {
    fn default() -> Self {
        Self::new()
    }
}

/// One in-flight edit: ops staged so far are already applied to the
/// document and roll back unless the transaction commits.
pub struct Transaction<'a> {
    doc: &'a mut Document,
    stack: &'a mut CommandStack,
    events: &'a mut EventBus,
    dirty: &'a mut bool,
    path: LogicalPath,
    ops: Vec<EditOp>,
    inverses: Vec<EditOp>,
    description: Option<String>,
    done: bool,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(
        doc: &'a mut Document,
        stack: &'a mut CommandStack,
        events: &'a mut EventBus,
        dirty: &'a mut bool,
        path: LogicalPath,
    ) -> Self {
        Self {
            doc,
            stack,
            events,
            dirty,
            path,
            ops: Vec::new(),
            inverses: Vec::new(),
            description: None,
            done: false,
        }
    }

    /// Validate and apply one op. On rejection the op is not applied and
    /// previously staged ops stay in place, still awaiting commit or
    /// rollback; the document never holds a half-applied op.
    pub fn push(&mut self, op: EditOp) -> Result<(), MutationError> {
        op.validate(self.doc)?;
        let inverse = op.inverse(self.doc)?;
        if let Err(err) = self.doc.apply_op(&op) {
            // Structurally impossible despite validation; put the document
            // back the way it was and poison the transaction.
            error!(path = %self.path, op = op.name(), %err, "staged op failed; rolling back");
            self.rollback();
            self.done = true;
            return Err(err);
        }
        self.ops.push(op);
        self.inverses.push(inverse);
        Ok(())
    }

    /// Label the resulting command for undo menus
    pub fn describe(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Finalize: record the staged ops as one command and notify
    /// subscribers. An empty transaction commits to nothing.
    pub fn commit(mut self) {
        self.done = true;
        if self.ops.is_empty() {
            return;
        }
        let shape_changed = self.ops.iter().any(EditOp::is_shape_changing);
        let mut inverses = std::mem::take(&mut self.inverses);
        inverses.reverse();
        let command = Command {
            ops: std::mem::take(&mut self.ops),
            inverses,
            description: self.description.take(),
            shape_changed,
        };
        debug!(
            path = %self.path,
            ops = command.ops.len(),
            shape_changed,
            "command committed"
        );
        self.stack.push(command);
        *self.dirty = true;
        self.events.emit(&DocumentChanged {
            path: self.path.clone(),
            shape_changed,
        });
    }

    /// Abandon: roll every staged op back and record nothing
    pub fn cancel(mut self) {
        self.done = true;
        self.rollback();
    }

    fn rollback(&mut self) {
        for inverse in self.inverses.drain(..).rev() {
            if let Err(err) = self.doc.apply_op(&inverse) {
                // Inverses were computed against the states they revert;
                // failing here means the tree is inconsistent.
                error!(path = %self.path, %err, "rollback op failed");
            }
        }
        self.ops.clear();
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.done {
            debug!(path = %self.path, staged = self.ops.len(), "transaction dropped; rolling back");
            self.rollback();
        }
    }
}
