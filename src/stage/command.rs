// src/stage/command.rs

//! Blocking external command execution for the command-backed stages.

use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, info};

/// Captured result of one external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, or `None` if the process was killed by a signal.
    pub status: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Last non-empty stdout line, trimmed.
    pub fn last_stdout_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .next_back()
    }

    /// Stderr trimmed to something that fits in a report line.
    pub fn stderr_tail(&self) -> String {
        const MAX: usize = 2000;
        let trimmed = self.stderr.trim();
        if trimmed.len() <= MAX {
            return trimmed.to_string();
        }
        let mut start = trimmed.len() - MAX;
        while !trimmed.is_char_boundary(start) {
            start += 1;
        }
        format!("...{}", &trimmed[start..])
    }
}

/// Substitute `{name}` placeholders in `template` with shell-quoted values.
///
/// The template is scanned once, left to right; inserted values are never
/// rescanned. Unknown placeholders are left untouched so that shell syntax
/// such as `${VAR}` keeps working.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let known = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match known {
            Some((close, value)) => {
                rendered.push_str(&shell_quote(value));
                rest = &after[close + 1..];
            }
            None => {
                rendered.push('{');
                rest = after;
            }
        }
    }
    rendered.push_str(rest);
    rendered
}

/// Quote `value` for POSIX `sh` (or leave it bare on Windows' `cmd`).
pub fn shell_quote(value: &str) -> String {
    if cfg!(windows) {
        return format!("\"{value}\"");
    }
    let is_plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if is_plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Run `cmd` through the platform shell, blocking until it exits.
///
/// `envs` are added to the child's environment; they are never logged.
pub fn run_shell(label: &str, cmd: &str, envs: &[(&str, &str)]) -> Result<CommandOutput> {
    info!(stage = label, cmd = %cmd, "starting external command");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in envs {
        command.env(key, value);
    }

    let output = command
        .output()
        .with_context(|| format!("spawning process for stage '{label}'"))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    for line in stderr.lines() {
        debug!(stage = label, "stderr: {}", line);
    }

    let status = output.status.code();
    info!(
        stage = label,
        exit_code = ?status,
        success = output.status.success(),
        "external command exited"
    );

    Ok(CommandOutput {
        status,
        success: output.status.success(),
        stdout,
        stderr,
    })
}
