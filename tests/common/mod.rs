//! Shared helpers for amorph integration tests

#![allow(dead_code)]

use amorph::prelude::*;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a tracing subscriber that writes through the test harness
///
/// Filter with `RUST_LOG`, e.g. `RUST_LOG=amorph_engine=debug`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Runtime with `threads` workers and the default policy
pub fn runtime(threads: usize) -> Runtime {
    runtime_with(threads, ConflictPolicy::RequesterAborts)
}

/// Runtime with `threads` workers and `policy`
pub fn runtime_with(threads: usize, policy: ConflictPolicy) -> Runtime {
    init_tracing();
    Runtime::builder()
        .threads(threads)
        .conflict_policy(policy)
        .build()
        .expect("test runtime config is valid")
}

/// Runtime running every invocation on the calling thread
pub fn serial_runtime() -> Runtime {
    init_tracing();
    Runtime::builder()
        .serial(true)
        .build()
        .expect("test runtime config is valid")
}

/// Union-find node used as a shared object
#[derive(Debug)]
pub struct Node {
    slot: OwnerSlot,
    parent: AtomicUsize,
    rank: AtomicU32,
}

impl Node {
    pub fn new(index: usize) -> Self {
        Node {
            slot: OwnerSlot::new(),
            parent: AtomicUsize::new(index),
            rank: AtomicU32::new(0),
        }
    }

    pub fn parent(&self) -> usize {
        self.parent.load(Ordering::Relaxed)
    }

    pub fn set_parent(&self, parent: usize) {
        self.parent.store(parent, Ordering::Relaxed);
    }

    pub fn rank(&self) -> u32 {
        self.rank.load(Ordering::Relaxed)
    }

    pub fn set_rank(&self, rank: u32) {
        self.rank.store(rank, Ordering::Relaxed);
    }
}

impl Lockable for Node {
    fn owner_slot(&self) -> &OwnerSlot {
        &self.slot
    }
}

/// Singleton forest of `n` nodes
pub fn forest(n: usize) -> Vec<Node> {
    (0..n).map(Node::new).collect()
}

/// Root of `x` without any ownership (single-threaded use only)
pub fn root_of(nodes: &[Node], mut x: usize) -> usize {
    while nodes[x].parent() != x {
        x = nodes[x].parent();
    }
    x
}

/// Plain serial union-find used as a reference
pub struct SerialUnionFind {
    parent: Vec<usize>,
    rank: Vec<u32>,
}

impl SerialUnionFind {
    pub fn new(n: usize) -> Self {
        SerialUnionFind {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            x = self.parent[x];
        }
        x
    }

    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        let (hi, lo) = if self.rank[ra] >= self.rank[rb] { (ra, rb) } else { (rb, ra) };
        self.parent[lo] = hi;
        if self.rank[hi] == self.rank[lo] {
            self.rank[hi] += 1;
        }
        true
    }

    /// Number of distinct sets
    pub fn components(&mut self) -> usize {
        let n = self.parent.len();
        (0..n).filter(|&x| self.find(x) == x).count()
    }
}
