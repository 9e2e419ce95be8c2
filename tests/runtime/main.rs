//! Runtime Integration Tests
//!
//! End-to-end `foreach` behavior: commit/abort/retry, rollback,
//! serializability, error propagation and configuration.

#[path = "../common/mod.rs"]
mod common;

mod counter;
mod failures;
mod serializability;
mod union_find;
