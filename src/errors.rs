// src/errors.rs

//! Crate-wide error types.
//!
//! - [`PipelineError`] covers everything that stops the orchestrator itself
//!   (bad config, IO, a malformed stage graph).
//! - [`ErrorKind`] / [`StageFailure`] describe why a single stage invocation
//!   failed. These are recorded per item and never abort the batch.

use thiserror::Error;

use crate::types::{ItemId, Stage};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid stage graph: {0}")]
    StageGraph(String),

    #[error("No stage function registered for {0}")]
    UnknownStage(Stage),

    #[error("Worker pool is closed")]
    PoolClosed,

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Classification of a failed stage invocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("product not found: {0}")]
    NotFound(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("processing failed (exit status {}): {stderr}", display_status(.status))]
    Processing { status: Option<i32>, stderr: String },

    #[error("stage panicked: {0}")]
    Panicked(String),

    #[error("worker exited before reporting an outcome")]
    WorkerLost,
}

fn display_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}

impl ErrorKind {
    /// Stable name of the kind, as shown in reports.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Auth(_) => "AuthError",
            ErrorKind::NotFound(_) => "NotFoundError",
            ErrorKind::Transient(_) => "TransientError",
            ErrorKind::CorruptArchive(_) => "CorruptArchiveError",
            ErrorKind::Processing { .. } => "ProcessingError",
            ErrorKind::Panicked(_) => "PanicError",
            ErrorKind::WorkerLost => "WorkerLostError",
        }
    }

    /// Only transient failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transient(_))
    }
}

/// A stage failure tagged with the item and stage it belongs to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} failed for '{item}': {kind}")]
pub struct StageFailure {
    pub item: ItemId,
    pub stage: Stage,
    pub kind: ErrorKind,
}

impl StageFailure {
    pub fn new(item: impl Into<ItemId>, stage: Stage, kind: ErrorKind) -> Self {
        Self {
            item: item.into(),
            stage,
            kind,
        }
    }
}
