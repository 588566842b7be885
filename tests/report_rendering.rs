// tests/report_rendering.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use s2flow::cli::LogLevel;
use s2flow::dag::ItemOutcome;
use s2flow::errors::{ErrorKind, StageFailure};
use s2flow::logging::resolve_level;
use s2flow::report::{ItemStatus, ResultCollector};
use s2flow::types::Stage;

fn outcome(item: &str) -> ItemOutcome {
    ItemOutcome {
        item: item.to_string(),
        upstream_failure: None,
        terminals: BTreeMap::new(),
        records: Vec::new(),
    }
}

fn with_terminal(mut o: ItemOutcome, stage: Stage, result: Result<&str, ErrorKind>) -> ItemOutcome {
    let item = o.item.clone();
    o.terminals.insert(
        stage,
        result
            .map(PathBuf::from)
            .map_err(|kind| StageFailure::new(item, stage, kind)),
    );
    o
}

fn failed_upstream(item: &str, stage: Stage, kind: ErrorKind) -> ItemOutcome {
    let mut o = outcome(item);
    o.upstream_failure = Some(StageFailure::new(item, stage, kind));
    o
}

#[test]
fn every_status_renders_in_submission_order() {
    let full = with_terminal(
        with_terminal(outcome("A"), Stage::Correct, Ok("/l2a/A")),
        Stage::MaskClouds,
        Ok("/masks/A.tif"),
    );
    let partial = with_terminal(
        with_terminal(outcome("B"), Stage::MaskClouds, Ok("/masks/B.tif")),
        Stage::Correct,
        Err(ErrorKind::Processing {
            status: Some(2),
            stderr: "bad".to_string(),
        }),
    );
    let failed = failed_upstream("C", Stage::Acquire, ErrorKind::NotFound("C".to_string()));

    let report = ResultCollector::collect(&[full, partial, failed]);

    let expected = "\
A: fully succeeded
  Correct: ok -> /l2a/A
  MaskClouds: ok -> /masks/A.tif
B: partially succeeded
  Correct: ProcessingError (processing failed (exit status 2): bad)
  MaskClouds: ok -> /masks/B.tif
C: failed upstream, stage=Acquire, kind=NotFoundError
  error: product not found: C
summary: 1 fully succeeded, 1 partially succeeded, 1 failed upstream
";
    assert_eq!(report.render(), expected);
    assert_eq!(format!("{report}"), expected);
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn both_branches_failing_is_still_partial() {
    let o = with_terminal(
        with_terminal(
            outcome("D"),
            Stage::Correct,
            Err(ErrorKind::Panicked("oops".to_string())),
        ),
        Stage::MaskClouds,
        Err(ErrorKind::WorkerLost),
    );
    let report = ResultCollector::collect(&[o]);

    assert_eq!(report.entry("D").map(|e| e.status), Some(ItemStatus::PartiallySucceeded));
    assert!(report.render().contains("  MaskClouds: WorkerLostError ("));
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn outcome_without_terminals_counts_as_failed_upstream() {
    let report = ResultCollector::collect(&[outcome("E")]);
    assert_eq!(report.count(ItemStatus::FailedUpstream), 1);
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn error_kind_names_are_stable() {
    let kinds = [
        (ErrorKind::Auth(String::new()), "AuthError"),
        (ErrorKind::NotFound(String::new()), "NotFoundError"),
        (ErrorKind::Transient(String::new()), "TransientError"),
        (ErrorKind::CorruptArchive(String::new()), "CorruptArchiveError"),
        (ErrorKind::Processing { status: None, stderr: String::new() }, "ProcessingError"),
        (ErrorKind::Panicked(String::new()), "PanicError"),
        (ErrorKind::WorkerLost, "WorkerLostError"),
    ];
    for (kind, name) in kinds {
        assert_eq!(kind.name(), name);
        assert_eq!(kind.is_retryable(), name == "TransientError");
    }
}

#[test]
fn log_level_flag_wins_over_env() {
    assert_eq!(resolve_level(Some(LogLevel::Debug), Some("error")), tracing::Level::DEBUG);
    assert_eq!(resolve_level(None, Some(" WARNING ")), tracing::Level::WARN);
    assert_eq!(resolve_level(None, Some("chatty")), tracing::Level::INFO);
    assert_eq!(resolve_level(None, None), tracing::Level::INFO);
}
