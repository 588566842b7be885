// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod report;
pub mod stage;
pub mod types;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_or_default, validate_config, ConfigFile};
use crate::dag::StageGraph;
use crate::engine::PipelineGraph;
use crate::exec::WorkerPool;
use crate::report::ResultCollector;
use crate::stage::{Credentials, StageRegistry};
use crate::types::ItemId;

/// High-level entry point used by `main.rs`.
///
/// Loads config, builds the stage registry and worker pool, runs the batch,
/// prints the report and returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let mut cfg = load_or_default(args.config.as_deref()).context("loading configuration")?;
    if let Some(workers) = args.workers {
        cfg.config.workers = workers;
    }
    validate_config(&cfg).context("validating configuration")?;

    let graph = StageGraph::satellite().context("building stage graph")?;

    if args.dry_run {
        print_dry_run(&cfg, &graph, &args.ids);
        return Ok(0);
    }

    let credentials = Credentials::new(args.username, args.password);
    let registry = StageRegistry::from_config(&cfg, credentials);
    let pool = WorkerPool::new(cfg.config.workers, registry)?;
    let pipeline = PipelineGraph::new(graph, pool)?;

    info!(
        items = args.ids.len(),
        data_dir = %cfg.config.data_dir.display(),
        "processing batch"
    );

    let summary = pipeline.run(args.ids).await?;
    let report = ResultCollector::collect(&summary.items);

    print!("{report}");
    println!("Finished in {:.1}s.", summary.elapsed.as_secs_f64());

    pipeline.shutdown().await;
    Ok(report.exit_code())
}

fn print_dry_run(cfg: &ConfigFile, graph: &StageGraph, ids: &[ItemId]) {
    println!("s2flow dry-run");
    println!("  config.workers = {}", cfg.config.workers);
    println!("  config.data_dir = {}", cfg.config.data_dir.display());
    println!();

    println!("stages:");
    for stage in graph.stages() {
        println!("  - {stage}");
        match graph.dependency_of(stage) {
            Some(dep) => println!("      after: {dep}"),
            None => println!("      root"),
        }
        match cfg.effective_cmd(stage) {
            Some(cmd) => println!("      cmd: {cmd}"),
            None => println!("      built-in"),
        }
        let section = cfg.stage_config(stage);
        if section.effective_retries() > 0 {
            println!(
                "      retries: {} (backoff {} ms)",
                section.effective_retries(),
                section.effective_backoff_ms()
            );
        }
    }
    println!();

    println!("items ({}):", ids.len());
    for id in ids {
        println!("  - {id}");
    }

    debug!("dry-run complete (no execution)");
}
