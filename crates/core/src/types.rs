//! Core identifier types for the runtime
//!
//! This module defines the identifiers used throughout the system:
//! - [`InvocationId`]: Unique identifier for one `foreach` invocation
//! - [`WorkerId`]: Index of a worker thread within an invocation
//! - [`IterationId`]: Identifier of one speculative iteration attempt

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of low bits of an [`IterationId`] reserved for the worker index.
pub const WORKER_BITS: u32 = 10;

/// Maximum number of workers a single runtime may spawn.
pub const MAX_WORKERS: usize = 1 << WORKER_BITS;

const WORKER_MASK: u64 = (1 << WORKER_BITS) - 1;

/// Unique identifier for a `foreach` invocation
///
/// Used to correlate log output and reports of one parallel loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(Uuid);

impl InvocationId {
    /// Create a new random InvocationId using UUID v4
    ///
    /// # Examples
    ///
    /// ```
    /// use amorph_core::types::InvocationId;
    ///
    /// let id1 = InvocationId::new();
    /// let id2 = InvocationId::new();
    /// assert_ne!(id1, id2);
    /// ```
    pub fn new() -> Self {
        InvocationId(Uuid::new_v4())
    }

    /// Get raw bytes representation
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a worker thread within an invocation
///
/// Per-worker state (chunk buffers, counters, active-iteration slots) is
/// stored in vectors indexed by this value rather than in thread-locals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(u32);

impl WorkerId {
    /// Create a worker id from its index
    ///
    /// # Panics
    ///
    /// Panics if `index >= MAX_WORKERS`.
    pub const fn new(index: usize) -> Self {
        assert!(index < MAX_WORKERS, "worker index out of range");
        WorkerId(index as u32)
    }

    /// Index into per-worker tables
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Identifier of one iteration attempt
///
/// Packs a runtime-wide sequence number with the index of the worker that
/// runs the attempt. The sequence occupies the high bits, so ordering two
/// ids orders them by the time they were allocated. The raw value is never
/// zero; ownership records use zero to mean "unowned".
///
/// # Examples
///
/// ```
/// use amorph_core::types::{IterationId, WorkerId};
///
/// let id = IterationId::new(7, WorkerId::new(3));
/// assert_eq!(id.sequence(), 7);
/// assert_eq!(id.worker(), WorkerId::new(3));
/// assert_eq!(IterationId::from_raw(id.raw()), Some(id));
/// assert_eq!(IterationId::from_raw(0), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IterationId(u64);

impl IterationId {
    /// Pack a sequence number and worker index
    ///
    /// # Panics
    ///
    /// Panics if `sequence` is zero.
    pub fn new(sequence: u64, worker: WorkerId) -> Self {
        assert!(sequence > 0, "iteration sequence numbers start at 1");
        IterationId((sequence << WORKER_BITS) | worker.0 as u64)
    }

    /// Rebuild an id from its raw encoding; `0` means "no iteration"
    #[inline]
    pub fn from_raw(raw: u64) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(IterationId(raw))
        }
    }

    /// Raw encoding, suitable for storing in an atomic
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Allocation sequence number
    #[inline]
    pub fn sequence(self) -> u64 {
        self.0 >> WORKER_BITS
    }

    /// Worker that runs this iteration
    #[inline]
    pub fn worker(self) -> WorkerId {
        WorkerId((self.0 & WORKER_MASK) as u32)
    }
}

impl std::fmt::Display for IterationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "it{}@{}", self.sequence(), self.worker())
    }
}
