//! Iteration manager for coordinating speculative attempts
//!
//! Hands out iteration ids, tracks which iteration each worker is running,
//! and applies the conflict policy when an acquire fails.
//!
//! ## Attempt Sequence
//!
//! ```text
//! 1. begin()            - allocate id, reset iteration, publish in active table
//! 2. body runs          - acquire() per object; on conflict resolve_conflict()
//! 3. is_wounded()       - checked at each acquire and before commit
//! 4. commit() / abort() - on the iteration itself
//! 5. finish()           - clear the worker's active slot
//! ```
//!
//! The sequence counter is shared by every invocation of a runtime, so ids
//! are unique for the runtime's lifetime and later attempts are younger.

use crate::conflict::{ActiveTable, ConflictPolicy};
use crate::iteration::Iteration;
use amorph_core::{Conflict, IterationId, WorkerId};
use std::sync::atomic::{AtomicU64, Ordering};

/// Manages iteration ids, liveness and conflict resolution
///
/// One manager per runtime. All methods take `&self`; the manager is shared
/// by every worker thread.
#[derive(Debug)]
pub struct IterationManager {
    /// Next sequence number
    ///
    /// Monotonically increasing, starts at 1 (0 is the "unowned" marker).
    next_seq: AtomicU64,

    /// Running iteration per worker
    active: ActiveTable,

    /// Policy applied on failed acquires
    policy: ConflictPolicy,
}

impl IterationManager {
    /// Create a manager for `workers` workers
    pub fn new(workers: usize, policy: ConflictPolicy) -> Self {
        IterationManager {
            next_seq: AtomicU64::new(1),
            active: ActiveTable::new(workers),
            policy,
        }
    }

    /// Conflict policy in force
    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Number of workers this manager tracks
    pub fn workers(&self) -> usize {
        self.active.len()
    }

    /// Number of ids allocated so far
    pub fn allocated(&self) -> u64 {
        self.next_seq.load(Ordering::Relaxed) - 1
    }

    /// Allocate the next iteration id for `worker`
    pub fn next_iteration_id(&self, worker: WorkerId) -> IterationId {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        IterationId::new(seq, worker)
    }

    /// Start a new attempt on `iteration`
    ///
    /// `birth` is the id of the item's first attempt, or `None` if this is
    /// the first attempt. Returns the new attempt's id.
    pub fn begin(&self, iteration: &mut Iteration<'_>, birth: Option<IterationId>) -> IterationId {
        let id = self.next_iteration_id(iteration.worker());
        let birth = birth.unwrap_or(id);
        iteration.reset(id, birth);
        self.active.begin(id, birth);
        id
    }

    /// Apply the policy to a failed acquire by `requester`
    ///
    /// The requester always aborts. Returns `true` if the owner was wounded
    /// as well.
    pub fn resolve_conflict(&self, requester: &Iteration<'_>, conflict: &Conflict) -> bool {
        if conflict.is_voluntary() || self.policy == ConflictPolicy::RequesterAborts {
            return false;
        }
        match self.active.birth_of(conflict.owner) {
            Some(owner_birth) if self.policy.wounds_owner(requester.birth(), owner_birth) => {
                self.active.wound(conflict.owner);
                true
            }
            _ => false,
        }
    }

    /// Check if `iteration` was wounded by an older one
    #[inline]
    pub fn is_wounded(&self, iteration: &Iteration<'_>) -> bool {
        self.policy == ConflictPolicy::YoungerAborts && self.active.is_wounded(iteration.id())
    }

    /// Clear `worker`'s active slot after commit or abort
    pub fn finish(&self, worker: WorkerId) {
        self.active.end(worker);
    }
}
