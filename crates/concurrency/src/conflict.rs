//! Conflict resolution
//!
//! When an acquire fails, the requester always aborts: acquisition never
//! waits, so there is nothing else it could do. The policy only decides
//! whether the *owner* is asked to abort too.
//!
//! | Policy | Requester | Owner |
//! |--------|-----------|-------|
//! | `RequesterAborts` | aborts | keeps running |
//! | `YoungerAborts` | aborts | wounded if younger than the requester |
//!
//! A wounded iteration notices at its next checked acquire or right before
//! commit, and aborts. Age is the id of the *first* attempt of a work item,
//! carried across retries, so the oldest outstanding item is never wounded
//! and eventually commits.
//!
//! The [`ActiveTable`] records, per worker, which iteration is running and
//! its age. Iteration ids carry their worker index, so looking up the owner
//! of a conflicting object is a direct index, not a map lookup.

use amorph_core::{IterationId, WorkerId};
use crossbeam_utils::CachePadded;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Which iterations abort on a failed acquire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Only the requester aborts
    #[default]
    RequesterAborts,
    /// The requester aborts; a younger owner is wounded as well
    YoungerAborts,
}

impl ConflictPolicy {
    /// Decide whether the owner of a contended object must also abort
    ///
    /// `requester_birth` and `owner_birth` are the first-attempt ids of the
    /// two work items.
    #[inline]
    pub fn wounds_owner(self, requester_birth: IterationId, owner_birth: IterationId) -> bool {
        match self {
            ConflictPolicy::RequesterAborts => false,
            ConflictPolicy::YoungerAborts => owner_birth > requester_birth,
        }
    }
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requester_aborts" | "requester" => Ok(ConflictPolicy::RequesterAborts),
            "younger_aborts" | "younger" => Ok(ConflictPolicy::YoungerAborts),
            other => Err(format!("unknown conflict policy '{}'", other)),
        }
    }
}

#[derive(Debug, Default)]
struct ActiveSlot {
    current: AtomicU64,
    birth: AtomicU64,
    wound: AtomicU64,
}

/// Per-worker record of the running iteration
#[derive(Debug)]
pub struct ActiveTable {
    slots: Vec<CachePadded<ActiveSlot>>,
}

impl ActiveTable {
    /// Create a table for `workers` workers
    pub fn new(workers: usize) -> Self {
        ActiveTable {
            slots: (0..workers).map(|_| CachePadded::new(ActiveSlot::default())).collect(),
        }
    }

    /// Number of worker slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the table has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Record that `id` (age `birth`) started on its worker
    pub fn begin(&self, id: IterationId, birth: IterationId) {
        let slot = &self.slots[id.worker().index()];
        slot.birth.store(birth.raw(), Ordering::Relaxed);
        slot.current.store(id.raw(), Ordering::Release);
    }

    /// Record that `worker` has no running iteration
    pub fn end(&self, worker: WorkerId) {
        self.slots[worker.index()].current.store(0, Ordering::Release);
    }

    /// Age of `owner` if it is still running
    pub fn birth_of(&self, owner: IterationId) -> Option<IterationId> {
        let slot = self.slots.get(owner.worker().index())?;
        if slot.current.load(Ordering::Acquire) != owner.raw() {
            return None;
        }
        let birth = slot.birth.load(Ordering::Relaxed);
        if slot.current.load(Ordering::Acquire) != owner.raw() {
            return None;
        }
        IterationId::from_raw(birth)
    }

    /// Ask `victim` to abort at its next check
    ///
    /// A wound addressed to an iteration that already finished is ignored
    /// by its successor on the same worker, since the ids differ.
    pub fn wound(&self, victim: IterationId) {
        if let Some(slot) = self.slots.get(victim.worker().index()) {
            slot.wound.store(victim.raw(), Ordering::Release);
        }
    }

    /// Check if `id` has been wounded
    #[inline]
    pub fn is_wounded(&self, id: IterationId) -> bool {
        self.slots[id.worker().index()].wound.load(Ordering::Acquire) == id.raw()
    }
}
