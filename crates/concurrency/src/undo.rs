//! Per-iteration undo log
//!
//! An iteration registers a compensating action *before* each mutation it
//! performs on shared state. If the iteration aborts, the log is replayed
//! in strict reverse registration order, so at any point the log exactly
//! reverses everything done so far.
//!
//! ## Entries
//!
//! Each [`UndoEntry`] names the object it restores (when known) and carries
//! the inverse operation. The `'env` lifetime ties entries to the data the
//! invocation borrows, not to the iteration, so recycling an iteration
//! never invalidates a pending entry.
//!
//! Undo actions run while the iteration still owns everything it acquired.
//! They must not try to acquire anything themselves.

use crate::ownership::{Lockable, OwnerSlot};
use amorph_core::IterationId;

/// One compensating action
pub struct UndoEntry<'env> {
    target: Option<&'env OwnerSlot>,
    inverse: Box<dyn FnOnce() + 'env>,
}

impl<'env> UndoEntry<'env> {
    /// Compensating action not tied to a specific object
    pub fn new(inverse: impl FnOnce() + 'env) -> Self {
        UndoEntry {
            target: None,
            inverse: Box::new(inverse),
        }
    }

    /// Compensating action restoring `target`
    pub fn for_object<L: Lockable + ?Sized>(target: &'env L, inverse: impl FnOnce() + 'env) -> Self {
        UndoEntry {
            target: Some(target.owner_slot()),
            inverse: Box::new(inverse),
        }
    }

    /// Object restored by this entry, if recorded
    pub fn target(&self) -> Option<&'env OwnerSlot> {
        self.target
    }
}

impl std::fmt::Debug for UndoEntry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoEntry")
            .field("targeted", &self.target.is_some())
            .finish()
    }
}

/// Ordered list of compensating actions for one iteration
#[derive(Debug, Default)]
pub struct UndoLog<'env> {
    entries: Vec<UndoEntry<'env>>,
}

impl<'env> UndoLog<'env> {
    /// Create an empty log
    pub fn new() -> Self {
        UndoLog {
            entries: Vec::new(),
        }
    }

    /// Append an entry
    pub fn push(&mut self, entry: UndoEntry<'env>) {
        self.entries.push(entry);
    }

    /// Append an untargeted compensating action
    pub fn record(&mut self, inverse: impl FnOnce() + 'env) {
        self.push(UndoEntry::new(inverse));
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there is nothing to undo
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every entry, newest first, and empty the log
    ///
    /// `owner` is the iteration being rolled back. A targeted entry whose
    /// object is not owned by `owner` is dropped without running: the
    /// object's state belongs to whoever owns it now.
    ///
    /// Returns the number of entries run.
    pub fn replay(&mut self, owner: IterationId) -> usize {
        let mut replayed = 0;
        while let Some(entry) = self.entries.pop() {
            if let Some(target) = entry.target {
                if !target.is_owned_by(owner) {
                    continue;
                }
            }
            (entry.inverse)();
            replayed += 1;
        }
        replayed
    }

    /// Drop every entry without running it (commit path)
    pub fn discard(&mut self) {
        self.entries.clear();
    }
}
