// src/stage/correct.rs

//! Correct: atmospheric correction of an extracted L1C product.

use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::errors::ErrorKind;
use crate::stage::command::{render_template, run_shell};
use crate::stage::paths::l2a_output_path;
use crate::stage::{upstream_path, StageFunction};
use crate::types::{Stage, StageValue};

/// Runs an external correction tool (Sen2Cor by default).
///
/// The output location is derived from the input, so a product that was
/// already corrected is not processed again.
#[derive(Debug, Clone)]
pub struct CommandCorrect {
    cmd: String,
    l1c_root: PathBuf,
    l2a_root: PathBuf,
}

impl CommandCorrect {
    pub fn new(cmd: impl Into<String>, l1c_root: impl Into<PathBuf>, l2a_root: impl Into<PathBuf>) -> Self {
        Self {
            cmd: cmd.into(),
            l1c_root: l1c_root.into(),
            l2a_root: l2a_root.into(),
        }
    }
}

impl StageFunction for CommandCorrect {
    fn stage(&self) -> Stage {
        Stage::Correct
    }

    fn run(&self, item: &str, input: &StageValue) -> Result<PathBuf, ErrorKind> {
        let safe_dir = upstream_path(Stage::Correct, input)?;
        let output = l2a_output_path(safe_dir, &self.l1c_root, &self.l2a_root);

        if output.exists() {
            info!(item, output = %output.display(), "corrected product already exists; skipping");
            return Ok(output);
        }

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| ErrorKind::Processing {
                status: None,
                stderr: format!("creating {}: {e}", parent.display()),
            })?;
        }

        let input_str = safe_dir.to_string_lossy();
        let output_str = output.to_string_lossy();
        let cmd = render_template(
            &self.cmd,
            &[("id", item), ("input", &*input_str), ("output", &*output_str)],
        );

        let out = run_shell(Stage::Correct.as_str(), &cmd, &[]).map_err(|e| {
            ErrorKind::Processing {
                status: None,
                stderr: format!("{e:#}"),
            }
        })?;

        if !out.success {
            return Err(ErrorKind::Processing {
                status: out.status,
                stderr: out.stderr_tail(),
            });
        }

        Ok(output)
    }
}
