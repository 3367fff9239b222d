//! Change notifications for the consuming UI layer.
//!
//! One event per committed command, undo, or redo. The shape flag tells
//! the consumer whether a local patch suffices or the whole form needs
//! rebuilding. Rejected and cancelled edits emit nothing.

use modforge_overlay::LogicalPath;

/// A document changed through a committed command, undo, or redo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChanged {
    pub path: LogicalPath,
    /// Root-level members were added or removed; descriptors and
    /// provenance were re-derived for the whole document
    pub shape_changed: bool,
}

/// Handle for removing a subscriber again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Callback = Box<dyn FnMut(&DocumentChanged)>;

/// Subscriber registry. Callbacks run synchronously on the mutation
/// sequence, after the document state is fully consistent.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<(SubscriberId, Callback)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&DocumentChanged) + 'static) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(subscriber, _)| *subscriber != id);
        self.subscribers.len() != before
    }

    pub(crate) fn emit(&mut self, event: &DocumentChanged) {
        for (_, callback) in &mut self.subscribers {
            callback(event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
