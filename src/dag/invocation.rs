// src/dag/invocation.rs

//! Stage invocations handed to the pool and the completions it reports.

use std::path::PathBuf;
use std::time::Instant;

use crate::errors::StageFailure;
use crate::types::{ItemId, Stage, StageValue};

/// Result of one stage: the path it produced, or why it failed.
pub type StageResult = Result<PathBuf, StageFailure>;

/// Identifies one stage of one item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskKey {
    pub item: ItemId,
    pub stage: Stage,
}

/// One execution of a stage function the scheduler wants run now.
///
/// Only created once the upstream stage has succeeded.
#[derive(Debug, Clone)]
pub struct StageInvocation {
    pub item: ItemId,
    pub stage: Stage,
    /// Monotonically increasing across the whole run; used as a tie-break
    /// when several completions are observed together.
    pub seq: u64,
    pub input: StageValue,
}

impl StageInvocation {
    pub fn key(&self) -> TaskKey {
        TaskKey {
            item: self.item.clone(),
            stage: self.stage,
        }
    }
}

/// Recorded outcome of one invocation.
#[derive(Debug, Clone)]
pub struct Completion {
    pub item: ItemId,
    pub stage: Stage,
    pub seq: u64,
    pub started_at: Instant,
    pub finished_at: Instant,
    pub outcome: StageResult,
}

impl Completion {
    pub fn key(&self) -> TaskKey {
        TaskKey {
            item: self.item.clone(),
            stage: self.stage,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Timing of one finished stage, kept per item for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: Stage,
    pub seq: u64,
    pub started_at: Instant,
    pub finished_at: Instant,
    pub succeeded: bool,
}

impl From<&Completion> for StageRecord {
    fn from(c: &Completion) -> Self {
        Self {
            stage: c.stage,
            seq: c.seq,
            started_at: c.started_at,
            finished_at: c.finished_at,
            succeeded: c.succeeded(),
        }
    }
}
