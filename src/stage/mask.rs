// src/stage/mask.rs

//! MaskClouds: cloud detection on an extracted L1C product.

use std::fs;
use std::path::PathBuf;

use crate::errors::ErrorKind;
use crate::stage::command::{render_template, run_shell};
use crate::stage::paths::cloud_mask_output_path;
use crate::stage::{upstream_path, StageFunction};
use crate::types::{Stage, StageValue};

/// Runs an external cloud-masking tool (python-fmask by default) and returns
/// the path of the mask it wrote.
#[derive(Debug, Clone)]
pub struct CommandMaskClouds {
    cmd: String,
    l1c_root: PathBuf,
    mask_root: PathBuf,
}

impl CommandMaskClouds {
    pub fn new(cmd: impl Into<String>, l1c_root: impl Into<PathBuf>, mask_root: impl Into<PathBuf>) -> Self {
        Self {
            cmd: cmd.into(),
            l1c_root: l1c_root.into(),
            mask_root: mask_root.into(),
        }
    }
}

impl StageFunction for CommandMaskClouds {
    fn stage(&self) -> Stage {
        Stage::MaskClouds
    }

    fn run(&self, item: &str, input: &StageValue) -> Result<PathBuf, ErrorKind> {
        let safe_dir = upstream_path(Stage::MaskClouds, input)?;
        let target = cloud_mask_output_path(safe_dir, &self.l1c_root, &self.mask_root);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| ErrorKind::Processing {
                status: None,
                stderr: format!("creating {}: {e}", parent.display()),
            })?;
        }

        let input_str = safe_dir.to_string_lossy();
        let target_str = target.to_string_lossy();
        let cmd = render_template(
            &self.cmd,
            &[("id", item), ("input", &*input_str), ("output", &*target_str)],
        );

        let out = run_shell(Stage::MaskClouds.as_str(), &cmd, &[]).map_err(|e| {
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

        Ok(target)
    }
}
