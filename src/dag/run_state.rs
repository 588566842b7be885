// src/dag/run_state.rs

//! Per-item state of a pipeline run.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::dag::invocation::{StageRecord, StageResult};
use crate::errors::StageFailure;
use crate::types::{ItemId, Stage};

/// Where an item is in its chain.
///
/// Phases are ordered and only ever move forward. `Done` and `Failed` are
/// terminal: `Done` means every terminal stage reported (successfully or
/// not), `Failed` means the chain broke before the split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ItemPhase {
    Acquire,
    Unpack,
    /// Correct and MaskClouds submitted.
    Branches,
    Done,
    Failed,
}

impl ItemPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemPhase::Done | ItemPhase::Failed)
    }
}

impl From<Stage> for ItemPhase {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Acquire => ItemPhase::Acquire,
            Stage::Unpack => ItemPhase::Unpack,
            Stage::Correct | Stage::MaskClouds => ItemPhase::Branches,
        }
    }
}

/// Mutable per-item state owned by the scheduler.
#[derive(Debug, Clone)]
pub struct ItemState {
    pub(crate) item: ItemId,
    pub(crate) phase: ItemPhase,
    /// Stages submitted for this item whose completion has not been seen.
    pub(crate) in_flight: BTreeSet<Stage>,
    pub(crate) upstream_failure: Option<StageFailure>,
    pub(crate) terminals: BTreeMap<Stage, StageResult>,
    pub(crate) records: Vec<StageRecord>,
}

impl ItemState {
    fn new(item: ItemId) -> Self {
        Self {
            item,
            phase: ItemPhase::Acquire,
            in_flight: BTreeSet::new(),
            upstream_failure: None,
            terminals: BTreeMap::new(),
            records: Vec::new(),
        }
    }

    pub fn phase(&self) -> ItemPhase {
        self.phase
    }

    pub fn in_flight(&self) -> impl Iterator<Item = Stage> + '_ {
        self.in_flight.iter().copied()
    }

    /// Move to `next` if that is a forward transition.
    ///
    /// Returns `false` (and leaves the phase untouched) otherwise.
    pub(crate) fn advance(&mut self, next: ItemPhase) -> bool {
        if self.phase.is_terminal() || next <= self.phase {
            if next != self.phase {
                warn!(
                    item = %self.item,
                    from = ?self.phase,
                    to = ?next,
                    "refusing non-forward phase transition"
                );
            }
            return false;
        }
        debug!(item = %self.item, from = ?self.phase, to = ?next, "item phase advanced");
        self.phase = next;
        true
    }
}

/// The whole batch: one entry per distinct item, in submission order.
#[derive(Debug, Clone, Default)]
pub struct PipelineRun {
    order: Vec<ItemId>,
    items: HashMap<ItemId, ItemState>,
}

impl PipelineRun {
    /// Create an entry for every item. Repeated identifiers keep only their
    /// first position.
    pub fn new(items: impl IntoIterator<Item = ItemId>) -> Self {
        let mut run = Self::default();
        for item in items {
            if run.items.contains_key(&item) {
                warn!(item = %item, "duplicate item in batch; keeping first occurrence");
                continue;
            }
            run.order.push(item.clone());
            run.items.insert(item.clone(), ItemState::new(item));
        }
        run
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Item identifiers in submission order.
    pub fn item_ids(&self) -> &[ItemId] {
        &self.order
    }

    pub fn get(&self, item: &str) -> Option<&ItemState> {
        self.items.get(item)
    }

    pub(crate) fn get_mut(&mut self, item: &str) -> Option<&mut ItemState> {
        self.items.get_mut(item)
    }

    pub fn phase_of(&self, item: &str) -> Option<ItemPhase> {
        self.items.get(item).map(|s| s.phase)
    }

    /// Whether every item has reached `Done` or `Failed`.
    pub fn all_settled(&self) -> bool {
        self.items.values().all(|s| s.phase.is_terminal())
    }

    /// Consume the run and produce outcomes in submission order.
    pub fn into_outcomes(mut self) -> Vec<ItemOutcome> {
        self.order
            .iter()
            .filter_map(|id| self.items.remove(id))
            .map(ItemOutcome::from)
            .collect()
    }
}

/// Final result for one item.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub item: ItemId,
    /// Set when the chain broke before reaching the terminal stages.
    pub upstream_failure: Option<StageFailure>,
    /// Results of the terminal stages that ran, keyed by stage.
    pub terminals: BTreeMap<Stage, StageResult>,
    /// Timing of every stage that finished, in the order it was observed.
    pub records: Vec<StageRecord>,
}

impl ItemOutcome {
    pub fn terminal(&self, stage: Stage) -> Option<&StageResult> {
        self.terminals.get(&stage)
    }

    pub fn correct(&self) -> Option<&StageResult> {
        self.terminal(Stage::Correct)
    }

    pub fn mask_clouds(&self) -> Option<&StageResult> {
        self.terminal(Stage::MaskClouds)
    }

    pub fn record(&self, stage: Stage) -> Option<&StageRecord> {
        self.records.iter().find(|r| r.stage == stage)
    }
}

impl From<ItemState> for ItemOutcome {
    fn from(state: ItemState) -> Self {
        Self {
            item: state.item,
            upstream_failure: state.upstream_failure,
            terminals: state.terminals,
            records: state.records,
        }
    }
}
