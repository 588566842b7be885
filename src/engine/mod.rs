// src/engine/mod.rs

//! Orchestration engine for s2flow.
//!
//! The pure scheduling state machine lives in [`crate::dag::scheduler`]; the
//! async shell that connects it to the worker pool is [`pipeline`].

use std::time::Duration;

use crate::dag::ItemOutcome;

pub mod pipeline;

pub use pipeline::PipelineGraph;

/// Everything a finished run hands back to its caller.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// One outcome per distinct item, in submission order.
    pub items: Vec<ItemOutcome>,
    /// Wall time of the run.
    pub elapsed: Duration,
    /// Highest number of stage functions the pool ran at once.
    pub peak_concurrency: usize,
}

impl RunSummary {
    pub fn get(&self, item: &str) -> Option<&ItemOutcome> {
        self.items.iter().find(|o| o.item == item)
    }
}
