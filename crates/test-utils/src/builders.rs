#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Instant;

use s2flow::config::{ConfigFile, ConfigSection, RawConfigFile, StageConfig};
use s2flow::dag::{Completion, StageInvocation};
use s2flow::errors::{ErrorKind, Result, StageFailure};
use s2flow::types::{ItemId, Stage};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                stage: Default::default(),
            },
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.config.workers = workers;
        self
    }

    pub fn data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.config.data_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Stage sections are keyed by their TOML name, e.g. `"mask_clouds"`.
    pub fn with_stage(mut self, name: &str, stage: StageConfig) -> Self {
        self.config.stage.insert(name.to_string(), stage);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StageConfig`.
pub struct StageConfigBuilder {
    stage: StageConfig,
}

impl StageConfigBuilder {
    pub fn new() -> Self {
        Self {
            stage: StageConfig::default(),
        }
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.stage.cmd = Some(cmd.to_string());
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.stage.retries = Some(retries);
        self
    }

    pub fn backoff_ms(mut self, ms: u64) -> Self {
        self.stage.retry_backoff_ms = Some(ms);
        self
    }

    pub fn auth_exit_codes(mut self, codes: &[i32]) -> Self {
        self.stage.auth_exit_codes = Some(codes.to_vec());
        self
    }

    pub fn not_found_exit_codes(mut self, codes: &[i32]) -> Self {
        self.stage.not_found_exit_codes = Some(codes.to_vec());
        self
    }

    pub fn build(self) -> StageConfig {
        self.stage
    }
}

impl Default for StageConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned item list from string literals.
pub fn ids(items: &[&str]) -> Vec<ItemId> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Successful completion for `inv`, producing `output`.
pub fn ok_completion(inv: &StageInvocation, output: impl Into<PathBuf>) -> Completion {
    let now = Instant::now();
    Completion {
        item: inv.item.clone(),
        stage: inv.stage,
        seq: inv.seq,
        started_at: now,
        finished_at: now,
        outcome: Ok(output.into()),
    }
}

/// Failed completion for `inv`.
pub fn failed_completion(inv: &StageInvocation, kind: ErrorKind) -> Completion {
    let now = Instant::now();
    Completion {
        item: inv.item.clone(),
        stage: inv.stage,
        seq: inv.seq,
        started_at: now,
        finished_at: now,
        outcome: Err(StageFailure::new(inv.item.clone(), inv.stage, kind)),
    }
}

/// Conventional fake output location of `stage` for `item`.
pub fn fake_output(stage: Stage, item: &str) -> PathBuf {
    PathBuf::from(format!("/fake/{}/{}", stage.config_key(), item))
}
