// src/report.rs

//! Final per-item report.
//!
//! Pure aggregation over [`ItemOutcome`]s: the same outcomes always render to
//! the same text, independent of the order in which stages completed.

use std::fmt;

use crate::dag::{ItemOutcome, StageResult};
use crate::types::{ItemId, Stage};

/// Terminal classification of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ItemStatus {
    FullySucceeded,
    /// The split was reached but at least one terminal stage failed.
    PartiallySucceeded,
    /// The chain broke before the split.
    FailedUpstream,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::FullySucceeded => "fully succeeded",
            ItemStatus::PartiallySucceeded => "partially succeeded",
            ItemStatus::FailedUpstream => "failed upstream",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One terminal stage's line in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageLine {
    pub stage: Stage,
    /// Output path on success.
    pub output: Option<String>,
    /// `(kind, message)` on failure.
    pub error: Option<(&'static str, String)>,
}

/// Where and why an item failed upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    pub stage: Stage,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub item: ItemId,
    pub status: ItemStatus,
    pub upstream: Option<UpstreamFailure>,
    pub stages: Vec<StageLine>,
}

/// Deterministic report over a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Report {
    entries: Vec<ReportEntry>,
}

/// Builds [`Report`]s from run outcomes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultCollector;

impl ResultCollector {
    /// Classify every outcome, keeping the order of `outcomes` (submission
    /// order when taken from a [`RunSummary`](crate::engine::RunSummary)).
    pub fn collect(outcomes: &[ItemOutcome]) -> Report {
        Report {
            entries: outcomes.iter().map(classify).collect(),
        }
    }
}

fn classify(outcome: &ItemOutcome) -> ReportEntry {
    let stages: Vec<StageLine> = outcome
        .terminals
        .iter()
        .map(|(stage, result)| stage_line(*stage, result))
        .collect();

    let upstream = outcome.upstream_failure.as_ref().map(|f| UpstreamFailure {
        stage: f.stage,
        kind: f.kind.name(),
        message: f.kind.to_string(),
    });

    let status = if upstream.is_some() || stages.is_empty() {
        ItemStatus::FailedUpstream
    } else if stages.iter().all(|s| s.error.is_none()) {
        ItemStatus::FullySucceeded
    } else {
        ItemStatus::PartiallySucceeded
    };

    ReportEntry {
        item: outcome.item.clone(),
        status,
        upstream,
        stages,
    }
}

fn stage_line(stage: Stage, result: &StageResult) -> StageLine {
    match result {
        Ok(path) => StageLine {
            stage,
            output: Some(path.display().to_string()),
            error: None,
        },
        Err(failure) => StageLine {
            stage,
            output: None,
            error: Some((failure.kind.name(), failure.kind.to_string())),
        },
    }
}

impl Report {
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn entry(&self, item: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.item == item)
    }

    pub fn count(&self, status: ItemStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    /// `1` if any item failed upstream, `0` otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.count(ItemStatus::FailedUpstream) > 0 {
            1
        } else {
            0
        }
    }

    /// The report as text; identical to its `Display` output.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            match &entry.upstream {
                Some(failure) => {
                    writeln!(
                        f,
                        "{}: {}, stage={}, kind={}",
                        entry.item, entry.status, failure.stage, failure.kind
                    )?;
                    writeln!(f, "  error: {}", failure.message)?;
                }
                None => writeln!(f, "{}: {}", entry.item, entry.status)?,
            }

            for line in &entry.stages {
                match (&line.output, &line.error) {
                    (Some(path), _) => writeln!(f, "  {}: ok -> {}", line.stage, path)?,
                    (None, Some((kind, message))) => {
                        writeln!(f, "  {}: {} ({})", line.stage, kind, message)?
                    }
                    (None, None) => {}
                }
            }
        }

        writeln!(
            f,
            "summary: {} fully succeeded, {} partially succeeded, {} failed upstream",
            self.count(ItemStatus::FullySucceeded),
            self.count(ItemStatus::PartiallySucceeded),
            self.count(ItemStatus::FailedUpstream),
        )
    }
}
