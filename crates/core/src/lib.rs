//! Core types for amorph
//!
//! This crate holds the vocabulary shared by every layer of the runtime:
//! - Identifiers: [`IterationId`], [`WorkerId`], [`InvocationId`]
//! - [`AccessMode`]: checked/unchecked and undo-logging access to shared objects
//! - The error taxonomy: [`IterationError`] inside bodies,
//!   [`ExecutionError`] at the `foreach` boundary

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod error;
pub mod types;

pub use access::AccessMode;
pub use error::{ConfigError, Conflict, ExecutionError, IterationError, Result, ScheduleError};
pub use types::{InvocationId, IterationId, WorkerId, MAX_WORKERS, WORKER_BITS};
