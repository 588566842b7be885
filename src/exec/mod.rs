// src/exec/mod.rs

//! Execution layer.
//!
//! - [`pool`] owns the bounded worker pool that runs stage functions on
//!   blocking threads and reports a [`Completion`](crate::dag::Completion)
//!   per invocation.
//! - [`handle`] provides [`TaskHandle`] and the `wait` / `wait_any` /
//!   `wait_all` primitives the orchestrator suspends on.

pub mod handle;
pub mod pool;

pub use handle::{wait_all, wait_any, TaskHandle};
pub use pool::{PoolStats, WorkerPool};
