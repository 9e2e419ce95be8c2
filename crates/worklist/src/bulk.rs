//! Bulk-synchronous worklist
//!
//! Two waves: workers pop from the current one while new items go to the
//! next. When the current wave is exhausted and nothing is in flight the
//! driver calls [`Worklist::advance_round`], which swaps the waves.
//!
//! Items retried after a conflict return to the current wave, so a round
//! only ends once every item in it has committed or been abandoned.
//!
//! The driver guarantees that `advance_round` never overlaps a push or pop.

use crate::{Fifo, Worklist};
use amorph_core::WorkerId;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Worklist that releases items in rounds
pub struct BulkSynchronous<'a, T> {
    waves: [Box<dyn Worklist<T> + 'a>; 2],
    current: AtomicUsize,
    round: AtomicU64,
}

impl<'a, T: Send + 'a> BulkSynchronous<'a, T> {
    /// Rounds of FIFO waves
    pub fn new() -> Self {
        Self::from_waves(Box::new(Fifo::new()), Box::new(Fifo::new()))
    }
}

impl<'a, T: Send + 'a> Default for BulkSynchronous<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> BulkSynchronous<'a, T> {
    /// Rounds alternating between two prebuilt waves
    pub fn from_waves(first: Box<dyn Worklist<T> + 'a>, second: Box<dyn Worklist<T> + 'a>) -> Self {
        BulkSynchronous {
            waves: [first, second],
            current: AtomicUsize::new(0),
            round: AtomicU64::new(0),
        }
    }

    /// Number of completed round advances
    pub fn round(&self) -> u64 {
        self.round.load(Ordering::Acquire)
    }

    fn current(&self) -> &dyn Worklist<T> {
        &*self.waves[self.current.load(Ordering::Acquire)]
    }

    fn next(&self) -> &dyn Worklist<T> {
        &*self.waves[1 - self.current.load(Ordering::Acquire)]
    }

    /// Items visible in the current round
    pub fn current_len(&self) -> usize {
        self.current().len()
    }

    /// Items waiting for the next round
    pub fn next_len(&self) -> usize {
        self.next().len()
    }
}

impl<'a, T: Send> Worklist<T> for BulkSynchronous<'a, T> {
    fn push(&self, worker: WorkerId, item: T) {
        self.next().push(worker, item);
    }

    fn push_retry(&self, worker: WorkerId, item: T) {
        self.current().push_retry(worker, item);
    }

    fn pop(&self, worker: WorkerId) -> Option<T> {
        self.current().pop(worker)
    }

    fn len(&self) -> usize {
        self.waves[0].len() + self.waves[1].len()
    }

    fn has_rounds(&self) -> bool {
        true
    }

    fn advance_round(&self) -> bool {
        if !self.current().is_empty() || self.next().is_empty() {
            return false;
        }
        let current = self.current.load(Ordering::Acquire);
        self.current.store(1 - current, Ordering::Release);
        self.round.fetch_add(1, Ordering::AcqRel);
        true
    }
}

impl<T> std::fmt::Debug for BulkSynchronous<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkSynchronous")
            .field("round", &self.round())
            .field("current", &self.current_len())
            .field("next", &self.next_len())
            .finish()
    }
}
