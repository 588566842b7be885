// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{ConfigFile, RawConfigFile, StageConfig};
use crate::errors::{PipelineError, Result};
use crate::types::Stage;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::PipelineError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_global_config(&raw)?;
        let stages = resolve_stage_names(&raw)?;
        validate_stage_sections(&stages)?;
        Ok(ConfigFile::new_unchecked(raw.config, stages))
    }
}

/// Re-validate an already constructed config (e.g. after CLI overrides).
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    if cfg.config.workers == 0 {
        return Err(zero_workers());
    }
    validate_stage_sections(&cfg.stage)
}

fn zero_workers() -> PipelineError {
    PipelineError::ConfigError("[config].workers must be >= 1 (got 0)".to_string())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.workers == 0 {
        return Err(zero_workers());
    }
    if cfg.config.data_dir.as_os_str().is_empty() {
        return Err(PipelineError::ConfigError(
            "[config].data_dir must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn resolve_stage_names(cfg: &RawConfigFile) -> Result<BTreeMap<Stage, StageConfig>> {
    let mut stages = BTreeMap::new();
    for (name, section) in cfg.stage.iter() {
        let stage: Stage = name.parse().map_err(|e: String| {
            PipelineError::ConfigError(format!("[stage.{name}]: {e}"))
        })?;
        if stages.insert(stage, section.clone()).is_some() {
            return Err(PipelineError::ConfigError(format!(
                "stage '{}' is configured more than once",
                stage.config_key()
            )));
        }
    }
    Ok(stages)
}

fn validate_stage_sections(stages: &BTreeMap<Stage, StageConfig>) -> Result<()> {
    for (stage, section) in stages.iter() {
        let key = stage.config_key();

        if let Some(cmd) = section.cmd.as_deref() {
            if *stage == Stage::Unpack {
                return Err(PipelineError::ConfigError(format!(
                    "[stage.{key}] is built in and does not accept `cmd`"
                )));
            }
            if cmd.trim().is_empty() {
                return Err(PipelineError::ConfigError(format!(
                    "[stage.{key}].cmd must not be empty"
                )));
            }
        }

        let has_exit_codes =
            section.auth_exit_codes.is_some() || section.not_found_exit_codes.is_some();
        if has_exit_codes && *stage != Stage::Acquire {
            return Err(PipelineError::ConfigError(format!(
                "[stage.{key}]: exit code mappings are only supported on [stage.acquire]"
            )));
        }
    }
    Ok(())
}
