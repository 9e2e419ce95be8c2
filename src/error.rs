//! Unified error type for amorph.
//!
//! Each crate reports its own errors; this module folds them into one enum
//! so applications can use a single `Result` across configuration, schedule
//! construction and loop execution.

use amorph_core::{ConfigError, ExecutionError, IterationId, ScheduleError, WorkerId};
use thiserror::Error;

/// All amorph errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A loop body reported that its own invariant was broken
    #[error("client invariant violated in {iteration}: {message}")]
    ClientInvariant {
        /// Iteration that reported the violation
        iteration: IterationId,
        /// Message from the body
        message: String,
    },

    /// A loop body panicked
    #[error("worker {worker} panicked: {message}")]
    WorkerPanicked {
        /// Worker whose body panicked
        worker: WorkerId,
        /// Panic message
        message: String,
    },

    /// Threads or other resources could not be obtained
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Invalid scheduling rule chain
    #[error("invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),

    /// Invalid runtime configuration
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for amorph operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error came from client code (invariant or panic).
    ///
    /// The runtime cannot repair these; the loop's data may hold the effects
    /// of every iteration committed before the failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ClientInvariant { .. } | Error::WorkerPanicked { .. }
        )
    }

    /// Check if this is a configuration or schedule error.
    ///
    /// These are raised before any iteration runs.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Schedule(_))
    }
}

impl From<ExecutionError> for Error {
    fn from(e: ExecutionError) -> Self {
        match e {
            ExecutionError::ClientInvariant { iteration, message } => {
                Error::ClientInvariant { iteration, message }
            }
            ExecutionError::WorkerPanicked { worker, message } => {
                Error::WorkerPanicked { worker, message }
            }
            ExecutionError::ResourceExhausted(msg) => Error::ResourceExhausted(msg),
            ExecutionError::Schedule(e) => Error::Schedule(e),
            ExecutionError::Config(e) => Error::Config(e),
        }
    }
}
