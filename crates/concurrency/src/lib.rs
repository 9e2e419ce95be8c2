//! Concurrency layer for amorph
//!
//! This crate implements speculative execution of loop iterations:
//! - OwnerSlot: per-object exclusive ownership with non-blocking acquire
//! - UndoLog: compensating actions replayed on abort
//! - Iteration: the commit/abort state machine of one attempt
//! - IterationManager: id allocation and conflict policy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conflict;
pub mod iteration;
pub mod manager;
pub mod ownership;
pub mod undo;

pub use conflict::{ActiveTable, ConflictPolicy};
pub use iteration::{AbortReason, Completion, Iteration, IterationStatus};
pub use manager::IterationManager;
pub use ownership::{Acquire, Lockable, OwnerSlot};
pub use undo::{UndoEntry, UndoLog};
