//! Worklists and scheduling rules for amorph
//!
//! A worklist holds the pending work items of one `foreach` invocation and
//! decides which item an idle worker receives next. Policies:
//!
//! | Policy | Order |
//! |--------|-------|
//! | [`Fifo`] | arrival order |
//! | [`Lifo`] | reverse arrival order |
//! | [`Ordered`] | client comparator (priority queue) |
//! | [`Chunked`] | batches of `n`, FIFO across batches |
//! | [`Bucketed`] | integer key buckets, lowest (or highest) bucket first |
//! | [`BulkSynchronous`] | rounds: items added in round k are seen in round k+1 |
//!
//! Policies are composed with [`Schedule`]; see its docs for how later rules
//! refine earlier ones.
//!
//! Deduplication is not performed. A client that must not enqueue an item
//! twice keeps a presence flag on the item itself.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bucketed;
pub mod bulk;
pub mod chunked;
pub mod fifo;
pub mod ordered;
pub mod schedule;

pub use bucketed::Bucketed;
pub use bulk::BulkSynchronous;
pub use chunked::Chunked;
pub use fifo::{Fifo, Lifo};
pub use ordered::Ordered;
pub use schedule::{Comparator, KeyFn, Rule, Schedule, Tiebreak, DEFAULT_CHUNK_SIZE};

use amorph_core::WorkerId;

/// Concurrent container of pending work items
///
/// Every method takes the calling worker's id so policies can keep
/// per-worker state without thread-locals. Ids must be below the worker
/// count the list was built for.
pub trait Worklist<T>: Send + Sync {
    /// Add a newly discovered item
    fn push(&self, worker: WorkerId, item: T);

    /// Resubmit an item whose iteration aborted on a conflict
    ///
    /// Round-based lists put it back into the round it came from.
    fn push_retry(&self, worker: WorkerId, item: T) {
        self.push(worker, item);
    }

    /// Take the next item for `worker`
    fn pop(&self, worker: WorkerId) -> Option<T>;

    /// Number of items held
    fn len(&self) -> usize;

    /// Check if no items are held
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the list separates items into rounds
    ///
    /// The driver only calls [`Worklist::advance_round`] for such lists, and
    /// only when no iteration is in flight.
    fn has_rounds(&self) -> bool {
        false
    }

    /// Make the next round's items visible
    ///
    /// Returns `false` if there is no next round to move to.
    fn advance_round(&self) -> bool {
        false
    }
}

impl<T, W: Worklist<T> + ?Sized> Worklist<T> for Box<W> {
    fn push(&self, worker: WorkerId, item: T) {
        (**self).push(worker, item)
    }

    fn push_retry(&self, worker: WorkerId, item: T) {
        (**self).push_retry(worker, item)
    }

    fn pop(&self, worker: WorkerId) -> Option<T> {
        (**self).pop(worker)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn has_rounds(&self) -> bool {
        (**self).has_rounds()
    }

    fn advance_round(&self) -> bool {
        (**self).advance_round()
    }
}
