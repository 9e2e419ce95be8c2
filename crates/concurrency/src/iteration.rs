//! Iteration state machine
//!
//! An [`Iteration`] is one speculative attempt at a work item. It tracks
//! the objects it owns, its undo log and its commit actions.
//!
//! ```text
//!            reset()
//!   Idle ───────────────► Running
//!    ▲                     │   │
//!    │         commit()    │   │  abort(reason)
//!    │     ┌───────────────┘   └──────────────┐
//!    │     ▼                                  ▼
//!    └── Committed                        Aborted { reason }
//!         (undo discarded,                 (undo replayed newest-first,
//!          commit actions run,              commit actions dropped,
//!          ownership released)              ownership released)
//! ```
//!
//! Iterations are recycled: each worker keeps one and calls
//! [`Iteration::reset`] for the next attempt, which keeps the capacity of
//! the held set and logs. An iteration never crosses threads.

use crate::ownership::{Acquire, OwnerSlot};
use crate::undo::{UndoEntry, UndoLog};
use amorph_core::{Conflict, IterationId, WorkerId};
use smallvec::SmallVec;

/// Why an iteration was rolled back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Lost a conflict; the item is retried
    Conflict(Conflict),
    /// The body abandoned the item
    NotUseful,
    /// The body reported an invariant violation
    Invariant(String),
    /// The body panicked
    Panicked,
}

/// Lifecycle state of an iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationStatus {
    /// Not started, or recycled after completion
    Idle,
    /// Body is executing
    Running,
    /// Committed
    Committed,
    /// Rolled back
    Aborted {
        /// Why the iteration aborted
        reason: AbortReason,
    },
}

/// Bookkeeping reported when an iteration completes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Completion {
    /// Ownership records acquired during the attempt
    pub acquired: usize,
    /// Ownership records released at completion
    pub released: usize,
    /// Undo entries replayed (zero on commit)
    pub undone: usize,
    /// Commit actions run (zero on abort)
    pub commit_actions: usize,
}

/// One speculative attempt at a work item
pub struct Iteration<'env> {
    id: IterationId,
    birth: IterationId,
    status: IterationStatus,
    held: SmallVec<[&'env OwnerSlot; 8]>,
    undo: UndoLog<'env>,
    commit_actions: Vec<Box<dyn FnOnce() + 'env>>,
    fail_safe: bool,
}

impl<'env> Iteration<'env> {
    /// Create an idle iteration for `worker`
    pub fn new(worker: WorkerId) -> Self {
        let placeholder = IterationId::new(1, worker);
        Iteration {
            id: placeholder,
            birth: placeholder,
            status: IterationStatus::Idle,
            held: SmallVec::new(),
            undo: UndoLog::new(),
            commit_actions: Vec::new(),
            fail_safe: false,
        }
    }

    /// Start a new attempt with identifier `id`
    ///
    /// `birth` is the id of the first attempt of the same work item (equal
    /// to `id` on the first attempt).
    ///
    /// # Panics
    ///
    /// Panics if the iteration is still running.
    pub fn reset(&mut self, id: IterationId, birth: IterationId) {
        assert!(
            self.status != IterationStatus::Running,
            "reset of running iteration {}",
            self.id
        );
        debug_assert!(self.held.is_empty() && self.undo.is_empty());
        self.id = id;
        self.birth = birth;
        self.status = IterationStatus::Running;
        self.commit_actions.clear();
        self.fail_safe = false;
    }

    /// Identifier of the current attempt
    #[inline]
    pub fn id(&self) -> IterationId {
        self.id
    }

    /// Identifier of the first attempt of this work item
    #[inline]
    pub fn birth(&self) -> IterationId {
        self.birth
    }

    /// Worker running this iteration
    #[inline]
    pub fn worker(&self) -> WorkerId {
        self.id.worker()
    }

    /// Current lifecycle state
    pub fn status(&self) -> &IterationStatus {
        &self.status
    }

    /// Check if the body is executing
    #[inline]
    pub fn is_running(&self) -> bool {
        self.status == IterationStatus::Running
    }

    /// Number of objects currently owned
    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// Number of undo entries registered so far
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Check if the body declared its fail-safe point
    pub fn past_fail_safe(&self) -> bool {
        self.fail_safe
    }

    /// Declare the fail-safe point
    ///
    /// The body promises no further conflicts can occur. The runtime does
    /// not enforce this; see `Context::fail_safe`.
    pub fn mark_fail_safe(&mut self) {
        self.fail_safe = true;
    }

    /// Take ownership of `slot` for this iteration
    ///
    /// Returns `Ok(true)` on first acquisition, `Ok(false)` if the slot was
    /// already held by this iteration, and the conflict otherwise.
    pub fn acquire(&mut self, slot: &'env OwnerSlot) -> Result<bool, Conflict> {
        debug_assert!(self.is_running(), "acquire outside a running iteration");
        match slot.try_acquire(self.id) {
            Acquire::Granted => {
                self.held.push(slot);
                Ok(true)
            }
            Acquire::Reentrant => Ok(false),
            Acquire::Held(owner) => Err(Conflict {
                requester: self.id,
                owner,
            }),
        }
    }

    /// Check if this iteration owns `slot`
    pub fn owns(&self, slot: &OwnerSlot) -> bool {
        slot.is_owned_by(self.id)
    }

    /// Append a compensating action
    pub fn register_undo(&mut self, entry: UndoEntry<'env>) {
        debug_assert!(self.is_running(), "undo registered outside a running iteration");
        self.undo.push(entry);
    }

    /// Append an action to run only if this iteration commits
    pub fn on_commit(&mut self, action: impl FnOnce() + 'env) {
        self.commit_actions.push(Box::new(action));
    }

    /// Commit the attempt
    ///
    /// Discards the undo log, runs commit actions in registration order,
    /// then releases every owned object.
    pub fn commit(&mut self) -> Completion {
        debug_assert!(self.is_running(), "commit of non-running iteration");
        let acquired = self.held.len();
        self.undo.discard();
        let commit_actions = self.commit_actions.len();
        for action in self.commit_actions.drain(..) {
            action();
        }
        let released = self.release_all();
        self.status = IterationStatus::Committed;
        Completion {
            acquired,
            released,
            undone: 0,
            commit_actions,
        }
    }

    /// Roll the attempt back
    ///
    /// Replays the undo log newest-first while ownership is still held,
    /// drops commit actions, then releases every owned object.
    pub fn abort(&mut self, reason: AbortReason) -> Completion {
        debug_assert!(self.is_running(), "abort of non-running iteration");
        let acquired = self.held.len();
        let undone = self.undo.replay(self.id);
        self.commit_actions.clear();
        let released = self.release_all();
        self.status = IterationStatus::Aborted { reason };
        Completion {
            acquired,
            released,
            undone,
            commit_actions: 0,
        }
    }

    fn release_all(&mut self) -> usize {
        let mut released = 0;
        for slot in self.held.drain(..) {
            if slot.release(self.id) {
                released += 1;
            }
        }
        released
    }
}

impl Drop for Iteration<'_> {
    fn drop(&mut self) {
        // Unwinding past a running iteration: free its objects so no other
        // iteration spins on them forever. The undo log is not replayed.
        if self.is_running() {
            self.undo.discard();
            self.release_all();
        }
    }
}

impl std::fmt::Debug for Iteration<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Iteration")
            .field("id", &self.id)
            .field("birth", &self.birth)
            .field("status", &self.status)
            .field("held", &self.held.len())
            .field("undo", &self.undo.len())
            .field("fail_safe", &self.fail_safe)
            .finish()
    }
}
