//! # Amorph
//!
//! Speculative parallel `foreach` for irregular workloads.
//!
//! A loop body runs once per work item, on many threads at once, as a
//! speculative iteration: it takes exclusive ownership of every shared
//! object it touches and records how to undo its mutations. When two
//! iterations collide one of them is rolled back and retried later, so the
//! committed iterations behave as if they had run one after another.
//! Bodies may add new work items while they run; the loop ends when no
//! items remain and no iteration is running.
//!
//! ## Quick Start
//!
//! ```
//! use amorph::prelude::*;
//!
//! let runtime = Runtime::builder().threads(4).build()?;
//! let sum = SpecCell::new(0u64);
//!
//! runtime.foreach(1..=10u64, runtime.default_schedule(), |n, ctx| {
//!     sum.update(ctx, |s| *s += n)?;
//!     if *n > 5 {
//!         ctx.add(n - 5);
//!     }
//!     Ok(())
//! })?;
//!
//! assert_eq!(sum.into_inner(), 55 + 15);
//! # Ok::<(), amorph::Error>(())
//! ```
//!
//! ## Layers
//!
//! - `amorph-core` - identifiers, access modes, error taxonomy
//! - `amorph-concurrency` - ownership records, undo logs, iterations, conflict policy
//! - `amorph-worklist` - scheduling policies and their composition
//! - `amorph-engine` - runtime, configuration, driver, statistics

#![warn(missing_docs)]

mod error;

pub mod prelude;

// Re-export main entry points
pub use amorph_engine::{
    Context, ForeachReport, Runtime, RuntimeBuilder, RuntimeConfig, RuntimeTotals, SpecCell,
};
pub use error::{Error, Result};

// Re-export types
pub use amorph_concurrency::{ConflictPolicy, Lockable, OwnerSlot};
pub use amorph_core::{
    AccessMode, Conflict, ExecutionError, InvocationId, IterationError, IterationId, WorkerId,
};
pub use amorph_worklist::{Rule, Schedule};
