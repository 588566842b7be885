// src/stage/retry.rs

//! Retry decorator for stage functions.
//!
//! The pool never retries on its own; wrapping a stage in [`Retrying`] is the
//! only way to get another attempt, and only `TransientError`s qualify.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::errors::ErrorKind;
use crate::stage::StageFunction;
use crate::types::{Stage, StageValue};

#[derive(Debug, Clone)]
pub struct Retrying<S> {
    inner: S,
    retries: u32,
    backoff: Duration,
}

impl<S: StageFunction> Retrying<S> {
    /// Allow up to `retries` extra attempts, sleeping `backoff * attempt`
    /// between them.
    pub fn new(inner: S, retries: u32, backoff: Duration) -> Self {
        Self {
            inner,
            retries,
            backoff,
        }
    }
}

impl<S: StageFunction> StageFunction for Retrying<S> {
    fn stage(&self) -> Stage {
        self.inner.stage()
    }

    fn run(&self, item: &str, input: &StageValue) -> Result<PathBuf, ErrorKind> {
        let mut attempt = 0;
        loop {
            match self.inner.run(item, input) {
                Err(kind) if kind.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        item,
                        stage = %self.inner.stage(),
                        attempt,
                        max_retries = self.retries,
                        error = %kind,
                        "transient failure; retrying"
                    );
                    // Blocking sleep: stage functions run on blocking threads.
                    thread::sleep(self.backoff * attempt);
                }
                result => return result,
            }
        }
    }
}
