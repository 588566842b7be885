use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::Stage;

/// Default worker count when neither the config nor the CLI sets one.
pub const DEFAULT_WORKERS: usize = 4;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// workers = 4
/// data_dir = "./data"
///
/// [stage.acquire]
/// cmd = "sentinelsat --uuid {id} --download --path {output_dir}"
/// retries = 2
///
/// [stage.correct]
/// cmd = "../sen2cor/bin/L2A_Process --output_dir {output} {input}"
/// ```
///
/// All sections are optional. Stage keys are kept as strings here and are
/// checked against the known stages during validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub stage: BTreeMap<String, StageConfig>,
}

/// Validated configuration.
///
/// Can only be obtained via `TryFrom<RawConfigFile>` (see `validate.rs`) or
/// [`ConfigFile::default`], which is always valid.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub stage: BTreeMap<Stage, StageConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, stage: BTreeMap<Stage, StageConfig>) -> Self {
        Self { config, stage }
    }

    /// Per-stage settings, falling back to an empty section.
    pub fn stage_config(&self, stage: Stage) -> StageConfig {
        self.stage.get(&stage).cloned().unwrap_or_default()
    }

    /// The command template a stage will run, if it runs one at all.
    ///
    /// `Unpack` is built in and never has a command.
    pub fn effective_cmd(&self, stage: Stage) -> Option<String> {
        if stage == Stage::Unpack {
            return None;
        }
        self.stage
            .get(&stage)
            .and_then(|s| s.cmd.clone())
            .or_else(|| default_cmd(stage).map(str::to_string))
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(ConfigSection::default(), BTreeMap::new())
    }
}

/// Built-in command templates, matching the tools the pipeline was written
/// against.
pub fn default_cmd(stage: Stage) -> Option<&'static str> {
    match stage {
        Stage::Acquire => Some(
            "sentinelsat --user \"$S2FLOW_USERNAME\" --password \"$S2FLOW_PASSWORD\" \
             --uuid {id} --download --path {output_dir}",
        ),
        Stage::Unpack => None,
        Stage::Correct => Some("../sen2cor/bin/L2A_Process --output_dir {output} {input}"),
        Stage::MaskClouds => Some("fmask_sentinel2Stacked.py --safedir {input} -o {output}"),
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Size of the worker pool.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Root under which `compressed/`, `l1c/`, `l2a/` and `cloud_masks/`
    /// are created.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            data_dir: default_data_dir(),
        }
    }
}

/// `[stage.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageConfig {
    /// Command template. If `None`, the built-in default for the stage is
    /// used.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Extra attempts after a `TransientError`. `0` or unset disables
    /// retrying.
    #[serde(default)]
    pub retries: Option<u32>,

    /// Linear backoff step between attempts.
    #[serde(default)]
    pub retry_backoff_ms: Option<u64>,

    /// Exit codes of the download command that mean "bad credentials".
    #[serde(default)]
    pub auth_exit_codes: Option<Vec<i32>>,

    /// Exit codes of the download command that mean "no such product".
    #[serde(default)]
    pub not_found_exit_codes: Option<Vec<i32>>,
}

impl StageConfig {
    pub fn effective_retries(&self) -> u32 {
        self.retries.unwrap_or(0)
    }

    pub fn effective_backoff_ms(&self) -> u64 {
        self.retry_backoff_ms.unwrap_or(500)
    }

    pub fn effective_auth_exit_codes(&self) -> Vec<i32> {
        self.auth_exit_codes.clone().unwrap_or_else(|| vec![3])
    }

    pub fn effective_not_found_exit_codes(&self) -> Vec<i32> {
        self.not_found_exit_codes.clone().unwrap_or_else(|| vec![4])
    }
}
