//! Integer-keyed bucket worklist (delta-stepping style)
//!
//! Items map to buckets through a client key; lower buckets are served
//! first (or higher, for a descending list). Each bucket is itself a
//! worklist built from the rest of the schedule.
//!
//! A cursor remembers the lowest bucket that may hold items. Pushes lower
//! it with `fetch_min`; pops scan upward from it and move it past empty
//! buckets. The cursor is only a hint: if the scan from the cursor finds
//! nothing while items remain, a full scan from bucket zero follows, so a
//! push racing with a cursor move can delay an item but never hide it.

use crate::schedule::KeyFn;
use crate::{Fifo, Worklist};
use amorph_core::WorkerId;
use std::borrow::Borrow;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Worklist of integer-keyed buckets
///
/// Keys are computed from `T`; the stored items are any `W: Borrow<T>`.
pub struct Bucketed<'a, T, W = T> {
    buckets: Vec<Box<dyn Worklist<W> + 'a>>,
    key: KeyFn<T>,
    ascending: bool,
    cursor: AtomicUsize,
    len: AtomicUsize,
}

impl<'a, T, W: Send + 'a> Bucketed<'a, T, W> {
    /// `buckets` FIFO buckets keyed by `key`, lowest first
    pub fn new(buckets: usize, key: KeyFn<T>) -> Self {
        let inner = (0..buckets.max(1))
            .map(|_| Box::new(Fifo::new()) as Box<dyn Worklist<W> + 'a>)
            .collect();
        Self::from_parts(inner, key, true)
    }
}

impl<'a, T, W> Bucketed<'a, T, W> {
    /// Assemble from prebuilt buckets
    ///
    /// `buckets[0]` holds key 0. Keys past the end are clamped to the last
    /// bucket.
    pub fn from_parts(
        buckets: Vec<Box<dyn Worklist<W> + 'a>>,
        key: KeyFn<T>,
        ascending: bool,
    ) -> Self {
        Bucketed {
            buckets,
            key,
            ascending,
            cursor: AtomicUsize::new(0),
            len: AtomicUsize::new(0),
        }
    }

    /// Number of buckets
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Scan position of the bucket holding `item`; scans always go upward
    fn position(&self, item: &W) -> usize
    where
        W: Borrow<T>,
    {
        let last = self.buckets.len().saturating_sub(1);
        let key = (self.key)(item.borrow()).min(last);
        if self.ascending {
            key
        } else {
            last - key
        }
    }

    fn bucket_at(&self, position: usize) -> &dyn Worklist<W> {
        let last = self.buckets.len() - 1;
        let index = if self.ascending { position } else { last - position };
        &*self.buckets[index]
    }

    fn scan(&self, worker: WorkerId, from: usize) -> Option<W> {
        for position in from..self.buckets.len() {
            if let Some(item) = self.bucket_at(position).pop(worker) {
                if position > from {
                    let _ = self.cursor.compare_exchange(
                        from,
                        position,
                        Ordering::AcqRel,
                        Ordering::Relaxed,
                    );
                }
                return Some(item);
            }
        }
        None
    }
}

impl<'a, T, W: Borrow<T> + Send> Worklist<W> for Bucketed<'a, T, W> {
    fn push(&self, worker: WorkerId, item: W) {
        let position = self.position(&item);
        // counted before it becomes poppable so `len` never underflows
        self.len.fetch_add(1, Ordering::AcqRel);
        self.bucket_at(position).push(worker, item);
        self.cursor.fetch_min(position, Ordering::AcqRel);
    }

    fn push_retry(&self, worker: WorkerId, item: W) {
        let position = self.position(&item);
        // counted before it becomes poppable so `len` never underflows
        self.len.fetch_add(1, Ordering::AcqRel);
        self.bucket_at(position).push_retry(worker, item);
        self.cursor.fetch_min(position, Ordering::AcqRel);
    }

    fn pop(&self, worker: WorkerId) -> Option<W> {
        let from = self.cursor.load(Ordering::Acquire);
        let mut item = self.scan(worker, from);
        if item.is_none() && from > 0 && self.len.load(Ordering::Acquire) > 0 {
            item = self.scan(worker, 0);
        }
        if item.is_some() {
            self.len.fetch_sub(1, Ordering::AcqRel);
        }
        item
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }
}

impl<T, W> std::fmt::Debug for Bucketed<'_, T, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucketed")
            .field("buckets", &self.buckets.len())
            .field("ascending", &self.ascending)
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .field("len", &self.len.load(Ordering::Relaxed))
            .finish()
    }
}
