//! Arrival-order worklists

use crate::Worklist;
use amorph_core::WorkerId;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// First-in first-out worklist
#[derive(Debug)]
pub struct Fifo<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> Fifo<T> {
    /// Create an empty list
    pub fn new() -> Self {
        Fifo {
            items: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> Default for Fifo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Worklist<T> for Fifo<T> {
    fn push(&self, _worker: WorkerId, item: T) {
        self.items.lock().push_back(item);
    }

    fn pop(&self, _worker: WorkerId) -> Option<T> {
        self.items.lock().pop_front()
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }
}

/// Last-in first-out worklist
#[derive(Debug)]
pub struct Lifo<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Lifo<T> {
    /// Create an empty list
    pub fn new() -> Self {
        Lifo {
            items: Mutex::new(Vec::new()),
        }
    }
}

impl<T> Default for Lifo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Worklist<T> for Lifo<T> {
    fn push(&self, _worker: WorkerId, item: T) {
        self.items.lock().push(item);
    }

    fn pop(&self, _worker: WorkerId) -> Option<T> {
        self.items.lock().pop()
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }
}
