// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `s2flow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "s2flow",
    version,
    about = "Acquire, unpack, correct and cloud-mask a batch of Sentinel-2 products.",
    long_about = None
)]
pub struct CliArgs {
    /// Product identifiers to process.
    #[arg(short = 'i', long = "ids", value_name = "ID", num_args = 1.., required = true)]
    pub ids: Vec<String>,

    /// Username for the product archive.
    #[arg(short = 'u', long, env = "S2FLOW_USERNAME", hide_env_values = true, default_value = "")]
    pub username: String,

    /// Password for the product archive.
    #[arg(short = 'p', long, env = "S2FLOW_PASSWORD", hide_env_values = true, default_value = "")]
    pub password: String,

    /// Path to the config file (TOML).
    ///
    /// Default: `S2flow.toml` in the current working directory if present,
    /// built-in defaults otherwise.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override `[config].workers`.
    #[arg(short = 'w', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `S2FLOW_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate config, print the stage graph and commands, run nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
