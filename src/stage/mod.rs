// src/stage/mod.rs

//! Stage functions: the blocking units of work the pool runs.
//!
//! - [`StageFunction`] is the single capability the pool is generic over.
//! - [`StageRegistry`] maps each [`Stage`] to the function that implements it.
//! - [`acquire`], [`unpack`], [`correct`] and [`mask`] are the shipped
//!   adapters; [`retry`] is a decorator for transient failures.
//! - [`command`] runs external tools the way the adapters need.

pub mod acquire;
pub mod command;
pub mod correct;
pub mod mask;
pub mod paths;
pub mod retry;
pub mod unpack;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::ConfigFile;
use crate::errors::ErrorKind;
use crate::types::{Stage, StageValue};

pub use acquire::{CommandAcquire, Credentials};
pub use correct::CommandCorrect;
pub use mask::CommandMaskClouds;
pub use retry::Retrying;
pub use unpack::ZipUnpack;

/// Contract for one pipeline stage.
///
/// Implementations are blocking: they may download, extract or spawn
/// external processes, and are always called from a blocking worker thread.
/// They must not share mutable state across concurrent invocations.
pub trait StageFunction: Send + Sync + 'static {
    /// Which stage this function implements.
    fn stage(&self) -> Stage;

    /// Run the stage for `item` against its upstream value.
    fn run(&self, item: &str, input: &StageValue) -> Result<PathBuf, ErrorKind>;
}

impl<S: StageFunction + ?Sized> StageFunction for Arc<S> {
    fn stage(&self) -> Stage {
        (**self).stage()
    }

    fn run(&self, item: &str, input: &StageValue) -> Result<PathBuf, ErrorKind> {
        (**self).run(item, input)
    }
}

/// Extract the upstream path for a non-root stage.
pub(crate) fn upstream_path<'a>(
    stage: Stage,
    input: &'a StageValue,
) -> Result<&'a Path, ErrorKind> {
    input.as_path().ok_or_else(|| ErrorKind::Processing {
        status: None,
        stderr: format!("{stage} expects an upstream path, got {input}"),
    })
}

/// Lookup table from [`Stage`] to its registered function.
#[derive(Clone, Default)]
pub struct StageRegistry {
    stages: BTreeMap<Stage, Arc<dyn StageFunction>>,
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.stages.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `func` under the stage it reports, replacing any previous
    /// registration.
    pub fn register<F: StageFunction>(&mut self, func: F) -> &mut Self {
        let stage = func.stage();
        if self.stages.insert(stage, Arc::new(func)).is_some() {
            debug!(%stage, "replaced previously registered stage function");
        }
        self
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with<F: StageFunction>(mut self, func: F) -> Self {
        self.register(func);
        self
    }

    pub fn get(&self, stage: Stage) -> Option<Arc<dyn StageFunction>> {
        self.stages.get(&stage).cloned()
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.stages.contains_key(&stage)
    }

    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.stages.keys().copied()
    }

    /// Build the production registry from config: command adapters for
    /// Acquire, Correct and MaskClouds, in-process extraction for Unpack,
    /// each wrapped in [`Retrying`] when its section asks for retries.
    pub fn from_config(cfg: &ConfigFile, credentials: Credentials) -> Self {
        let data_dir = cfg.config.data_dir.clone();
        let mut registry = Self::new();

        for stage in Stage::ALL {
            let section = cfg.stage_config(stage);
            let cmd = cfg.effective_cmd(stage).unwrap_or_default();

            let func: Arc<dyn StageFunction> = match stage {
                Stage::Acquire => Arc::new(
                    CommandAcquire::new(cmd, paths::compressed_dir(&data_dir), credentials.clone())
                        .with_exit_codes(
                            section.effective_auth_exit_codes(),
                            section.effective_not_found_exit_codes(),
                        ),
                ),
                Stage::Unpack => Arc::new(ZipUnpack::new(paths::l1c_dir(&data_dir))),
                Stage::Correct => Arc::new(CommandCorrect::new(
                    cmd,
                    paths::l1c_dir(&data_dir),
                    paths::l2a_dir(&data_dir),
                )),
                Stage::MaskClouds => Arc::new(CommandMaskClouds::new(
                    cmd,
                    paths::l1c_dir(&data_dir),
                    paths::cloud_mask_dir(&data_dir),
                )),
            };

            let retries = section.effective_retries();
            if retries > 0 {
                let backoff = Duration::from_millis(section.effective_backoff_ms());
                registry.register(Retrying::new(func, retries, backoff));
            } else {
                registry.register(func);
            }
        }

        registry
    }
}
