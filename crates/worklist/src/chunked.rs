//! Chunked worklist
//!
//! Each worker fills a private open chunk; a full chunk is sealed (sorted
//! into its inner order) and appended to a shared FIFO of chunks. A worker
//! pops from its current chunk and only touches the shared FIFO when that
//! chunk runs out, so the shared lock is taken once per `size` items.
//!
//! ```text
//!   worker 0: open [a b]      current [x y]
//!   worker 1: open []         current []
//!   shared:   [c d e] -> [f g h] -> ...
//! ```
//!
//! When a worker finds nothing in its own chunks or the shared FIFO it
//! takes work from other workers' chunks, so no item is stranded in a
//! partly filled open chunk.

use crate::schedule::Tiebreak;
use crate::Worklist;
use amorph_core::WorkerId;
use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Local<W> {
    open: Vec<W>,
    current: VecDeque<W>,
}

/// Worklist handing out items in chunks of a fixed size
///
/// Rules order `T`; the stored items are any `W: Borrow<T>`.
pub struct Chunked<T, W = T> {
    size: usize,
    order: Tiebreak<T>,
    locals: Vec<CachePadded<Mutex<Local<W>>>>,
    chunks: Mutex<VecDeque<VecDeque<W>>>,
    len: AtomicUsize,
}

impl<T, W: Borrow<T>> Chunked<T, W> {
    /// Chunks of `size` items in arrival order
    pub fn new(size: usize, workers: usize) -> Self {
        Self::with_order(size, Tiebreak::arrival(false), workers)
    }

    /// Chunks of `size` items, each sorted by `order`
    pub fn with_order(size: usize, order: Tiebreak<T>, workers: usize) -> Self {
        Chunked {
            size: size.max(1),
            order,
            locals: (0..workers.max(1))
                .map(|_| {
                    CachePadded::new(Mutex::new(Local {
                        open: Vec::new(),
                        current: VecDeque::new(),
                    }))
                })
                .collect(),
            chunks: Mutex::new(VecDeque::new()),
            len: AtomicUsize::new(0),
        }
    }

    /// Chunk size
    pub fn chunk_size(&self) -> usize {
        self.size
    }

    /// Number of sealed chunks waiting in the shared FIFO
    pub fn shared_chunks(&self) -> usize {
        self.chunks.lock().len()
    }

    fn seal(&self, open: &mut Vec<W>) -> VecDeque<W> {
        let mut items = std::mem::replace(open, Vec::with_capacity(self.size));
        self.order.sort(&mut items);
        items.into()
    }

    fn take(&self, item: Option<W>) -> Option<W> {
        if item.is_some() {
            self.len.fetch_sub(1, Ordering::AcqRel);
        }
        item
    }

    fn steal(&self, thief: WorkerId) -> Option<W> {
        for (i, local) in self.locals.iter().enumerate() {
            if i == thief.index() {
                continue;
            }
            let mut victim = local.lock();
            if let Some(item) = victim.current.pop_front() {
                return Some(item);
            }
            if !victim.open.is_empty() {
                let mut chunk = self.seal(&mut victim.open);
                drop(victim);
                let first = chunk.pop_front();
                if !chunk.is_empty() {
                    self.chunks.lock().push_back(chunk);
                }
                return first;
            }
        }
        None
    }
}

impl<T, W: Borrow<T> + Send> Worklist<W> for Chunked<T, W> {
    fn push(&self, worker: WorkerId, item: W) {
        let mut local = self.locals[worker.index()].lock();
        local.open.push(item);
        self.len.fetch_add(1, Ordering::AcqRel);
        if local.open.len() >= self.size {
            let chunk = self.seal(&mut local.open);
            drop(local);
            self.chunks.lock().push_back(chunk);
        }
    }

    fn pop(&self, worker: WorkerId) -> Option<W> {
        {
            let mut local = self.locals[worker.index()].lock();
            if let Some(item) = local.current.pop_front() {
                return self.take(Some(item));
            }
            if let Some(chunk) = self.chunks.lock().pop_front() {
                local.current = chunk;
                let item = local.current.pop_front();
                return self.take(item);
            }
            if !local.open.is_empty() {
                let chunk = self.seal(&mut local.open);
                local.current = chunk;
                let item = local.current.pop_front();
                return self.take(item);
            }
        }
        let item = self.steal(worker);
        self.take(item)
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }
}

impl<T, W> std::fmt::Debug for Chunked<T, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunked")
            .field("size", &self.size)
            .field("order", &self.order)
            .field("len", &self.len.load(Ordering::Relaxed))
            .finish()
    }
}
