//! Convenient imports for amorph.
//!
//! This module re-exports the most commonly used types so you can get started
//! with a single import:
//!
//! ```
//! use amorph::prelude::*;
//!
//! let runtime = Runtime::builder().serial(true).build().unwrap();
//! let schedule: Schedule<u32> = Schedule::first(Rule::Lifo);
//! runtime.foreach([1u32, 2, 3], schedule, |_, _| Ok(())).unwrap();
//! ```

// Main entry point
pub use crate::{Runtime, RuntimeBuilder, RuntimeConfig};

// Error handling
pub use crate::error::{Error, Result};

// Loop bodies
pub use crate::{AccessMode, Context, IterationError, SpecCell};

// Shared objects
pub use crate::{Lockable, OwnerSlot};

// Scheduling
pub use crate::{Rule, Schedule};

// Policies and reports
pub use crate::{ConflictPolicy, ForeachReport};
