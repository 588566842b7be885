// src/stage/acquire.rs

//! Acquire: fetch the compressed product for an identifier.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::ErrorKind;
use crate::stage::command::{render_template, run_shell};
use crate::stage::paths::item_dir_name;
use crate::stage::StageFunction;
use crate::types::{Stage, StageValue};

/// Archive credentials. Passed to the download command through
/// `S2FLOW_USERNAME` / `S2FLOW_PASSWORD`.
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Runs a download command in `<download_root>/<id>/` and locates the
/// resulting archive.
///
/// Exit codes listed in `auth_exit_codes` / `not_found_exit_codes` are
/// classified accordingly; every other failure is treated as transient.
#[derive(Debug, Clone)]
pub struct CommandAcquire {
    cmd: String,
    download_root: PathBuf,
    credentials: Credentials,
    auth_exit_codes: Vec<i32>,
    not_found_exit_codes: Vec<i32>,
}

impl CommandAcquire {
    pub fn new(cmd: impl Into<String>, download_root: impl Into<PathBuf>, credentials: Credentials) -> Self {
        Self {
            cmd: cmd.into(),
            download_root: download_root.into(),
            credentials,
            auth_exit_codes: vec![3],
            not_found_exit_codes: vec![4],
        }
    }

    pub fn with_exit_codes(mut self, auth: Vec<i32>, not_found: Vec<i32>) -> Self {
        self.auth_exit_codes = auth;
        self.not_found_exit_codes = not_found;
        self
    }

    fn classify_exit(&self, status: Option<i32>, detail: String) -> ErrorKind {
        match status {
            Some(code) if self.auth_exit_codes.contains(&code) => ErrorKind::Auth(detail),
            Some(code) if self.not_found_exit_codes.contains(&code) => ErrorKind::NotFound(detail),
            _ => ErrorKind::Transient(detail),
        }
    }
}

impl StageFunction for CommandAcquire {
    fn stage(&self) -> Stage {
        Stage::Acquire
    }

    fn run(&self, item: &str, _input: &StageValue) -> Result<PathBuf, ErrorKind> {
        let output_dir = self.download_root.join(item_dir_name(item));

        if let Some(existing) = single_archive_in(&output_dir) {
            info!(item, archive = %existing.display(), "archive already downloaded; reusing it");
            return Ok(existing);
        }

        fs::create_dir_all(&output_dir).map_err(|e| {
            ErrorKind::Transient(format!("creating {}: {e}", output_dir.display()))
        })?;

        let output_dir_str = output_dir.to_string_lossy();
        let cmd = render_template(&self.cmd, &[("id", item), ("output_dir", &*output_dir_str)]);
        let out = run_shell(
            Stage::Acquire.as_str(),
            &cmd,
            &[
                ("S2FLOW_USERNAME", self.credentials.username.as_str()),
                ("S2FLOW_PASSWORD", self.credentials.password.as_str()),
            ],
        )
        .map_err(|e| ErrorKind::Transient(format!("{e:#}")))?;

        if !out.success {
            return Err(self.classify_exit(out.status, out.stderr_tail()));
        }

        if let Some(reported) = out.last_stdout_line().map(PathBuf::from) {
            if reported.is_file() {
                debug!(item, archive = %reported.display(), "download command reported archive path");
                return Ok(reported);
            }
        }

        single_archive_in(&output_dir).ok_or_else(|| {
            ErrorKind::Transient(format!(
                "download finished but no single .zip archive was found in {}",
                output_dir.display()
            ))
        })
    }
}

/// The only `.zip` file directly inside `dir`, if there is exactly one.
fn single_archive_in(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut archives = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
        });

    let first = archives.next()?;
    match archives.next() {
        None => Some(first),
        Some(_) => None,
    }
}
