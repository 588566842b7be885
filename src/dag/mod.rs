// src/dag/mod.rs

//! Stage graph and scheduling.
//!
//! - [`graph`] holds the per-item stage DAG as explicit data.
//! - [`invocation`] defines what the scheduler hands to the pool and what
//!   the pool reports back.
//! - [`run_state`] tracks each item's phase and results.
//! - [`scheduler`] is the pure state machine that decides which stages are
//!   ready to run.
//! - [`scheduler_step`] defines the result type for scheduler steps.

pub mod graph;
pub mod invocation;
pub mod run_state;
pub mod scheduler;
pub mod scheduler_step;

pub use graph::{StageGraph, SATELLITE_EDGES};
pub use invocation::{Completion, StageInvocation, StageRecord, StageResult, TaskKey};
pub use run_state::{ItemOutcome, ItemPhase, ItemState, PipelineRun};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
