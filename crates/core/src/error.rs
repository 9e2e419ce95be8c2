//! Error types for the runtime
//!
//! Two layers:
//! - [`IterationError`]: signals raised inside a loop body. Conflicts and
//!   not-useful aborts are contained by the driver; only invariant
//!   violations escape.
//! - [`ExecutionError`]: what a `foreach` invocation returns to its caller.

use crate::types::{IterationId, WorkerId};
use thiserror::Error;

/// Two iterations contended for the same shared object
///
/// `owner == requester` for voluntary conflicts raised by the body itself
/// and for iterations aborted because an older iteration wounded them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict {
    /// Iteration whose acquire failed (and which aborts)
    pub requester: IterationId,
    /// Iteration holding the object at the time of the acquire
    pub owner: IterationId,
}

impl Conflict {
    /// Conflict raised by an iteration against itself
    pub fn voluntary(iteration: IterationId) -> Self {
        Conflict {
            requester: iteration,
            owner: iteration,
        }
    }

    /// Check if the body raised this conflict itself
    pub fn is_voluntary(&self) -> bool {
        self.requester == self.owner
    }
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_voluntary() {
            write!(f, "{} raised a conflict", self.requester)
        } else {
            write!(f, "{} blocked by owner {}", self.requester, self.owner)
        }
    }
}

/// Signal raised while an iteration body runs
///
/// Bodies return `Result<(), IterationError>`; `Context` operations that
/// can fail return this type so `?` propagates them out of the body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IterationError {
    /// Ownership could not be acquired; roll back and retry the item
    #[error("conflict: {0}")]
    Conflict(Conflict),

    /// The body abandoned the item; nothing to retry
    #[error("iteration not useful")]
    NotUseful,

    /// The body observed state that breaks its own preconditions
    #[error("invariant violation: {0}")]
    Invariant(String),
}

impl IterationError {
    /// Create an invariant violation
    pub fn invariant(message: impl Into<String>) -> Self {
        IterationError::Invariant(message.into())
    }

    /// Check if the work item should be resubmitted
    pub fn is_retryable(&self) -> bool {
        matches!(self, IterationError::Conflict(_))
    }

    /// Check if this error stops the whole invocation
    pub fn is_fatal(&self) -> bool {
        matches!(self, IterationError::Invariant(_))
    }
}

impl From<Conflict> for IterationError {
    fn from(conflict: Conflict) -> Self {
        IterationError::Conflict(conflict)
    }
}

/// Invalid scheduling rule chain
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// A schedule needs at least one rule
    #[error("schedule has no rules")]
    Empty,

    /// A rule follows a terminal FIFO/LIFO rule and could never apply
    #[error("rule {rule} at position {index} follows a terminal rule")]
    UnreachableRule {
        /// Position in the chain
        index: usize,
        /// Rule name
        rule: &'static str,
    },

    /// Bulk-synchronous rounds are only supported as the outermost rule
    #[error("bulk-synchronous rule must be first, found at position {index}")]
    MisplacedBarrier {
        /// Position in the chain
        index: usize,
    },

    /// A chunked rule nested inside another chunked rule
    #[error("chunked rule at position {index} is already inside a chunk")]
    NestedChunk {
        /// Position in the chain
        index: usize,
    },

    /// Chunk size of zero
    #[error("chunk size must be at least 1")]
    ZeroChunkSize,

    /// Bucket count of zero
    #[error("bucket count must be at least 1")]
    ZeroBuckets,
}

/// Invalid runtime configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Thread count outside `1..=MAX_WORKERS`
    #[error("thread count {0} out of range (1..={max})", max = crate::types::MAX_WORKERS)]
    InvalidThreads(usize),

    /// Chunk size of zero
    #[error("default chunk size must be at least 1")]
    InvalidChunkSize,

    /// Malformed TOML
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file could not be read
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable with an unusable value
    #[error("invalid value '{value}' for {var}")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Value found
        value: String,
    },
}

/// Failure of a `foreach` invocation
///
/// Conflicts and not-useful aborts never appear here.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A body reported an invariant violation
    #[error("client invariant violated in {iteration}: {message}")]
    ClientInvariant {
        /// Iteration that reported the violation
        iteration: IterationId,
        /// Message from the body
        message: String,
    },

    /// A body panicked
    #[error("worker {worker} panicked: {message}")]
    WorkerPanicked {
        /// Worker whose body panicked
        worker: WorkerId,
        /// Panic payload, if it was a string
        message: String,
    },

    /// Threads or worklist storage could not be obtained
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The schedule could not be built
    #[error("invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),

    /// The runtime configuration is invalid
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl ExecutionError {
    /// Check if the failure came from client code rather than the runtime
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ExecutionError::ClientInvariant { .. } | ExecutionError::WorkerPanicked { .. }
        )
    }
}

/// Result type for `foreach` invocations
pub type Result<T> = std::result::Result<T, ExecutionError>;
