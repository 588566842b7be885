// src/exec/handle.rs

//! Deferred references to stage results, and the ways to wait on them.

use std::collections::BTreeMap;
use std::time::Instant;

use futures::future::{join_all, select_all};
use tokio::sync::watch;

use crate::dag::invocation::{Completion, StageInvocation, TaskKey};
use crate::errors::{ErrorKind, StageFailure};
use crate::types::Stage;

/// Handle to the eventual [`Completion`] of one submitted invocation.
///
/// The worker that runs the invocation is the only writer; any number of
/// clones may wait on it.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    key: TaskKey,
    seq: u64,
    rx: watch::Receiver<Option<Completion>>,
}

impl TaskHandle {
    pub(crate) fn new(invocation: &StageInvocation, rx: watch::Receiver<Option<Completion>>) -> Self {
        Self {
            key: invocation.key(),
            seq: invocation.seq,
            rx,
        }
    }

    pub fn key(&self) -> &TaskKey {
        &self.key
    }

    pub fn item(&self) -> &str {
        &self.key.item
    }

    pub fn stage(&self) -> Stage {
        self.key.stage
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Whether [`wait`](Self::wait) would return immediately.
    pub fn is_finished(&self) -> bool {
        self.rx.borrow().is_some() || self.rx.has_changed().is_err()
    }

    /// The completion, if it is already available.
    pub fn try_completion(&self) -> Option<Completion> {
        if let Some(done) = self.rx.borrow().clone() {
            return Some(done);
        }
        if self.rx.has_changed().is_err() {
            return Some(self.lost());
        }
        None
    }

    /// Suspend until the invocation completes.
    ///
    /// If the worker went away without reporting, this returns a failed
    /// completion of kind [`ErrorKind::WorkerLost`] rather than hanging.
    pub async fn wait(&self) -> Completion {
        let mut rx = self.rx.clone();
        let done = match rx.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };
        done.unwrap_or_else(|| self.lost())
    }

    fn lost(&self) -> Completion {
        let now = Instant::now();
        Completion {
            item: self.key.item.clone(),
            stage: self.key.stage,
            seq: self.seq,
            started_at: now,
            finished_at: now,
            outcome: Err(StageFailure::new(
                self.key.item.clone(),
                self.key.stage,
                ErrorKind::WorkerLost,
            )),
        }
    }
}

/// Wait until at least one handle has completed, then split the set into
/// `(completed, remaining)` without waiting for the rest.
///
/// Both halves keep the relative order of `handles`.
pub async fn wait_any(handles: Vec<TaskHandle>) -> (Vec<TaskHandle>, Vec<TaskHandle>) {
    if handles.is_empty() {
        return (Vec::new(), Vec::new());
    }

    if !handles.iter().any(TaskHandle::is_finished) {
        let waits: Vec<_> = handles.iter().map(|h| Box::pin(h.wait())).collect();
        let (_first, _index, _rest) = select_all(waits).await;
    }

    handles.into_iter().partition(TaskHandle::is_finished)
}

/// Wait for every handle and collect all completions, failures included.
pub async fn wait_all(handles: Vec<TaskHandle>) -> BTreeMap<TaskKey, Completion> {
    join_all(handles.iter().map(|h| h.wait()))
        .await
        .into_iter()
        .map(|c| (c.key(), c))
        .collect()
}
