//! Priority-ordered worklist
//!
//! A shared binary heap ordered by a [`Tiebreak`]: the client comparator
//! first, then later comparators, then arrival. With a batch size above
//! one, a worker claims that many minimal items at once into a private
//! buffer, trading strictness for fewer trips to the shared heap.
//!
//! Dequeue order is exact only for a single worker; with several workers
//! it holds modulo items claimed concurrently.

use crate::schedule::Tiebreak;
use crate::Worklist;
use amorph_core::WorkerId;
use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Heap entry; reverses the tie-break so the max-heap yields the minimum
struct Entry<T, W> {
    item: W,
    seq: u64,
    order: Arc<Tiebreak<T>>,
}

impl<T, W: Borrow<T>> PartialEq for Entry<T, W> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T, W: Borrow<T>> Eq for Entry<T, W> {}

impl<T, W: Borrow<T>> PartialOrd for Entry<T, W> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, W: Borrow<T>> Ord for Entry<T, W> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.order.compare_with_arrival(
            other.item.borrow(),
            other.seq,
            self.item.borrow(),
            self.seq,
        )
    }
}

struct Heap<T, W> {
    entries: BinaryHeap<Entry<T, W>>,
    next_seq: u64,
}

/// Priority queue worklist
///
/// Rules compare `T`; the list stores any `W: Borrow<T>`, which lets the
/// driver keep bookkeeping next to each item.
pub struct Ordered<T, W = T> {
    heap: Mutex<Heap<T, W>>,
    order: Arc<Tiebreak<T>>,
    batch: usize,
    buffers: Vec<CachePadded<Mutex<VecDeque<W>>>>,
    len: AtomicUsize,
}

impl<T, W> Ordered<T, W> {
    /// Create a list ordered by `order`, claiming `batch` items per visit
    pub fn new(order: Tiebreak<T>, batch: usize, workers: usize) -> Self {
        let batch = batch.max(1);
        let buffers = if batch > 1 {
            (0..workers.max(1))
                .map(|_| CachePadded::new(Mutex::new(VecDeque::new())))
                .collect()
        } else {
            Vec::new()
        };
        Ordered {
            heap: Mutex::new(Heap {
                entries: BinaryHeap::new(),
                next_seq: 0,
            }),
            order: Arc::new(order),
            batch,
            buffers,
            len: AtomicUsize::new(0),
        }
    }

    /// Items claimed per visit to the shared heap
    pub fn batch(&self) -> usize {
        self.batch
    }

    fn take(&self, item: Option<W>) -> Option<W> {
        if item.is_some() {
            self.len.fetch_sub(1, AtomicOrdering::AcqRel);
        }
        item
    }
}

impl<T, W: Borrow<T> + Send> Worklist<W> for Ordered<T, W> {
    fn push(&self, _worker: WorkerId, item: W) {
        let mut heap = self.heap.lock();
        let seq = heap.next_seq;
        heap.next_seq += 1;
        heap.entries.push(Entry {
            item,
            seq,
            order: Arc::clone(&self.order),
        });
        self.len.fetch_add(1, AtomicOrdering::AcqRel);
    }

    fn pop(&self, worker: WorkerId) -> Option<W> {
        if self.batch == 1 {
            let item = self.heap.lock().entries.pop().map(|e| e.item);
            return self.take(item);
        }

        let own = &self.buffers[worker.index()];
        if let Some(item) = own.lock().pop_front() {
            return self.take(Some(item));
        }

        {
            let mut heap = self.heap.lock();
            if let Some(first) = heap.entries.pop() {
                let mut buffer = own.lock();
                for _ in 1..self.batch {
                    match heap.entries.pop() {
                        Some(e) => buffer.push_back(e.item),
                        None => break,
                    }
                }
                return self.take(Some(first.item));
            }
        }

        // Heap is empty; take from buffers other workers claimed
        for (i, buffer) in self.buffers.iter().enumerate() {
            if i == worker.index() {
                continue;
            }
            if let Some(item) = buffer.lock().pop_front() {
                return self.take(Some(item));
            }
        }
        None
    }

    fn len(&self) -> usize {
        self.len.load(AtomicOrdering::Acquire)
    }
}

impl<T, W> std::fmt::Debug for Ordered<T, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ordered")
            .field("order", &self.order)
            .field("batch", &self.batch)
            .field("len", &self.len.load(AtomicOrdering::Relaxed))
            .finish()
    }
}
