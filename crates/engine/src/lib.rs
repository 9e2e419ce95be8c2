//! Execution engine for amorph
//!
//! This crate runs speculative parallel loops:
//! - Runtime: configuration, id allocation and the `foreach` entry point
//! - Context: the body's handle for acquiring objects, undo and new work
//! - SpecCell: a ready-made shared object with automatic undo
//! - ForeachReport / RuntimeTotals: statistics per invocation and overall
//!
//! The driver itself is private; bodies only ever see a [`Context`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
mod driver;
pub mod objects;
pub mod runtime;
pub mod stats;

pub use config::RuntimeConfig;
pub use context::Context;
pub use objects::SpecCell;
pub use runtime::{Runtime, RuntimeBuilder};
pub use stats::{ForeachReport, RuntimeTotals, WorkerStats};

// Types every body signature mentions
pub use amorph_concurrency::{ConflictPolicy, Lockable, OwnerSlot};
pub use amorph_core::{AccessMode, ExecutionError, IterationError};
