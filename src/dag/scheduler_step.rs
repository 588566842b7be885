// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::invocation::StageInvocation;
use crate::types::ItemId;

/// Structured result of a single scheduler "step".
///
/// Useful for tests that want to manually step the run and make assertions
/// about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Invocations whose upstream just became satisfied.
    pub newly_scheduled: Vec<StageInvocation>,
    /// Items whose chain broke in this step.
    pub newly_failed: Vec<ItemId>,
    /// Whether this step settled the last outstanding item.
    pub run_just_finished: bool,
}
