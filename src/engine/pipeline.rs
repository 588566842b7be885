// src/engine/pipeline.rs

use std::time::Instant;

use tracing::{debug, info};

use crate::dag::{Completion, Scheduler, StageGraph, StageInvocation};
use crate::errors::{PipelineError, Result};
use crate::exec::{wait_all, wait_any, TaskHandle, WorkerPool};
use crate::types::ItemId;

use super::RunSummary;

/// Drives the [`Scheduler`] against a [`WorkerPool`].
///
/// The scheduler decides *what* may run; this shell submits it, suspends on
/// the handles, and feeds completions back. All run semantics live in the
/// scheduler; this type only does the async plumbing.
#[derive(Debug)]
pub struct PipelineGraph {
    graph: StageGraph,
    pool: WorkerPool,
}

impl PipelineGraph {
    /// Fails if a stage of `graph` has no function registered in the pool.
    pub fn new(graph: StageGraph, pool: WorkerPool) -> Result<Self> {
        if let Some(missing) = graph.stages().find(|s| !pool.registry().contains(*s)) {
            return Err(PipelineError::UnknownStage(missing));
        }
        Ok(Self { graph, pool })
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Run every item of the batch through the graph.
    ///
    /// Root stages are submitted for all items at once. Completions are
    /// observed with [`wait_any`] so an early finisher's next stage starts
    /// while slower items are still upstream. Once only terminal stages are
    /// left in flight, they are joined with [`wait_all`].
    ///
    /// The summary's peak concurrency covers this run only.
    pub async fn run(&self, items: Vec<ItemId>) -> Result<RunSummary> {
        let started = Instant::now();
        self.pool.reset_peak();
        let mut scheduler = Scheduler::new(self.graph.clone(), items);

        info!(
            items = scheduler.run().len(),
            workers = self.pool.size(),
            "pipeline run starting"
        );

        let mut in_flight = self.submit_all(scheduler.start())?;

        while !in_flight.is_empty() {
            let only_terminals = in_flight.iter().all(|h| self.graph.is_terminal(h.stage()));

            let completions: Vec<Completion> = if only_terminals {
                debug!(pending = in_flight.len(), "only terminal stages left; joining");
                let joined = wait_all(std::mem::take(&mut in_flight)).await;
                joined.into_values().collect()
            } else {
                let (done, rest) = wait_any(std::mem::take(&mut in_flight)).await;
                in_flight = rest;
                done.iter().filter_map(TaskHandle::try_completion).collect()
            };

            for completion in ordered(completions) {
                let next = scheduler.handle_completion(&completion);
                in_flight.extend(self.submit_all(next)?);
            }
        }

        let elapsed = started.elapsed();
        let peak_concurrency = self.pool.stats().peak;
        info!(
            elapsed_ms = elapsed.as_millis() as u64,
            peak_concurrency,
            "pipeline run finished"
        );

        Ok(RunSummary {
            items: scheduler.into_outcomes(),
            elapsed,
            peak_concurrency,
        })
    }

    /// Close the pool and wait for its workers.
    pub async fn shutdown(self) {
        self.pool.shutdown().await;
    }

    fn submit_all(&self, invocations: Vec<StageInvocation>) -> Result<Vec<TaskHandle>> {
        invocations
            .into_iter()
            .map(|inv| self.pool.submit(inv))
            .collect()
    }
}

/// Completions observed together are processed in submission order.
fn ordered(mut completions: Vec<Completion>) -> Vec<Completion> {
    completions.sort_by_key(|c| c.seq);
    completions
}
