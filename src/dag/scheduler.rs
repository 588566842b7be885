use tracing::{debug, info, warn};

use crate::dag::graph::StageGraph;
use crate::dag::invocation::{Completion, StageInvocation, StageRecord};
use crate::dag::run_state::{ItemOutcome, ItemPhase, PipelineRun};
use crate::dag::scheduler_step::SchedulerStep;
use crate::types::{ItemId, StageValue};

/// Scheduler holds the immutable stage graph plus the mutable run state.
///
/// It is responsible for:
/// - handing out the root invocation of every item
/// - turning each successful completion into invocations of its dependents
/// - recording upstream failures so dependents are never scheduled
/// - collecting terminal results per item
///
/// It performs no IO and never blocks; the async shell in
/// [`crate::engine`] feeds it completions.
#[derive(Debug)]
pub struct Scheduler {
    graph: StageGraph,
    run: PipelineRun,
    next_seq: u64,
    started: bool,
}

impl Scheduler {
    pub fn new(graph: StageGraph, items: impl IntoIterator<Item = ItemId>) -> Self {
        Self {
            graph,
            run: PipelineRun::new(items),
            next_seq: 0,
            started: false,
        }
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    pub fn run(&self) -> &PipelineRun {
        &self.run
    }

    pub fn phase_of(&self, item: &str) -> Option<ItemPhase> {
        self.run.phase_of(item)
    }

    /// Number of invocations handed out whose completion has not been seen.
    pub fn in_flight(&self) -> usize {
        self.run
            .item_ids()
            .iter()
            .filter_map(|id| self.run.get(id))
            .map(|s| s.in_flight.len())
            .sum()
    }

    /// `true` once [`start`](Self::start) ran and every item is settled.
    pub fn is_finished(&self) -> bool {
        self.started && self.run.all_settled()
    }

    /// Produce the root invocation for every item, in submission order.
    ///
    /// Only the first call does anything.
    pub fn start(&mut self) -> Vec<StageInvocation> {
        if self.started {
            warn!("scheduler already started; ignoring");
            return Vec::new();
        }
        self.started = true;

        let root = self.graph.root();
        let mut ready = Vec::with_capacity(self.run.len());

        for id in self.run.item_ids().to_vec() {
            let seq = self.next_seq;
            self.next_seq += 1;

            if let Some(state) = self.run.get_mut(&id) {
                state.in_flight.insert(root);
                state.advance(ItemPhase::from(root));
            }
            ready.push(StageInvocation {
                item: id.clone(),
                stage: root,
                seq,
                input: StageValue::Product(id),
            });
        }

        info!(items = ready.len(), %root, "scheduler: submitting root stage for every item");
        ready
    }

    /// Record a completion (production API).
    pub fn handle_completion(&mut self, completion: &Completion) -> Vec<StageInvocation> {
        self.step_completion(completion).newly_scheduled
    }

    /// Manual-step variant of `handle_completion` that returns a rich
    /// [`SchedulerStep`].
    pub fn step_completion(&mut self, completion: &Completion) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        let Some(state) = self.run.get_mut(&completion.item) else {
            warn!(item = %completion.item, "completion for unknown item; ignoring");
            return step;
        };

        if !state.in_flight.remove(&completion.stage) {
            warn!(
                item = %completion.item,
                stage = %completion.stage,
                seq = completion.seq,
                "completion for a stage that is not in flight; ignoring"
            );
            return step;
        }

        state.records.push(StageRecord::from(completion));
        let dependents = self.graph.dependents_of(completion.stage);

        match &completion.outcome {
            Ok(output) if dependents.is_empty() => {
                debug!(item = %state.item, stage = %completion.stage, "terminal stage succeeded");
                state.terminals.insert(completion.stage, Ok(output.clone()));
            }
            Ok(output) => {
                for &next in dependents {
                    let seq = self.next_seq;
                    self.next_seq += 1;
                    state.in_flight.insert(next);
                    step.newly_scheduled.push(StageInvocation {
                        item: state.item.clone(),
                        stage: next,
                        seq,
                        input: StageValue::Path(output.clone()),
                    });
                }
                if let Some(&first) = dependents.first() {
                    state.advance(ItemPhase::from(first));
                }
                debug!(
                    item = %state.item,
                    stage = %completion.stage,
                    dependents = ?dependents,
                    "stage succeeded; dependents ready"
                );
            }
            Err(failure) if dependents.is_empty() => {
                warn!(
                    item = %state.item,
                    stage = %completion.stage,
                    error = %failure.kind,
                    "terminal stage failed"
                );
                state.terminals.insert(completion.stage, Err(failure.clone()));
            }
            Err(failure) => {
                warn!(
                    item = %state.item,
                    stage = %completion.stage,
                    kind = failure.kind.name(),
                    error = %failure.kind,
                    "upstream stage failed; dependents will not run"
                );
                state.upstream_failure = Some(failure.clone());
                state.advance(ItemPhase::Failed);
                step.newly_failed.push(state.item.clone());
            }
        }

        if state.in_flight.is_empty() && !state.phase.is_terminal() {
            state.advance(ItemPhase::Done);
        }

        step.run_just_finished = self.run.all_settled();
        if step.run_just_finished {
            info!("scheduler: every item settled; run finished");
        }
        step
    }

    /// Consume the scheduler and return outcomes in submission order.
    pub fn into_outcomes(self) -> Vec<ItemOutcome> {
        self.run.into_outcomes()
    }
}
