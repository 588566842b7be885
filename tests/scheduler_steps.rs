// tests/scheduler_steps.rs
//
// Drives the pure scheduler by hand, without a worker pool.

use std::path::PathBuf;

use s2flow::dag::{ItemPhase, Scheduler, StageGraph, StageInvocation};
use s2flow::errors::ErrorKind;
use s2flow::types::{Stage, StageValue};
use s2flow_test_utils::builders::{failed_completion, fake_output, ids, ok_completion};
use s2flow_test_utils::init_tracing;

fn satellite() -> StageGraph {
    StageGraph::satellite().expect("satellite graph is valid")
}

fn find<'a>(invs: &'a [StageInvocation], item: &str, stage: Stage) -> &'a StageInvocation {
    invs.iter()
        .find(|i| i.item == item && i.stage == stage)
        .unwrap_or_else(|| panic!("no invocation of {stage} for {item} in {invs:?}"))
}

#[test]
fn start_emits_one_root_invocation_per_item() {
    init_tracing();

    let mut scheduler = Scheduler::new(satellite(), ids(&["A", "B", "C"]));
    let roots = scheduler.start();

    assert_eq!(roots.len(), 3);
    assert!(roots.iter().all(|i| i.stage == Stage::Acquire));
    assert_eq!(
        roots.iter().map(|i| i.item.as_str()).collect::<Vec<_>>(),
        vec!["A", "B", "C"]
    );
    assert_eq!(roots[1].input, StageValue::Product("B".to_string()));
    assert!(roots.windows(2).all(|w| w[0].seq < w[1].seq));
    assert_eq!(scheduler.in_flight(), 3);

    // Only the first start counts.
    assert!(scheduler.start().is_empty());
    assert_eq!(scheduler.in_flight(), 3);
}

#[test]
fn success_walks_the_chain_and_splits_after_unpack() {
    init_tracing();

    let mut scheduler = Scheduler::new(satellite(), ids(&["A"]));
    let roots = scheduler.start();
    assert_eq!(scheduler.phase_of("A"), Some(ItemPhase::Acquire));

    let next = scheduler.handle_completion(&ok_completion(&roots[0], "/data/A.zip"));
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].stage, Stage::Unpack);
    assert_eq!(next[0].input, StageValue::Path(PathBuf::from("/data/A.zip")));
    assert_eq!(scheduler.phase_of("A"), Some(ItemPhase::Unpack));

    let branches = scheduler.handle_completion(&ok_completion(&next[0], "/data/l1c/A.SAFE"));
    let stages: Vec<Stage> = branches.iter().map(|i| i.stage).collect();
    assert_eq!(stages, vec![Stage::Correct, Stage::MaskClouds]);
    assert!(branches
        .iter()
        .all(|i| i.input == StageValue::Path(PathBuf::from("/data/l1c/A.SAFE"))));
    assert_eq!(scheduler.phase_of("A"), Some(ItemPhase::Branches));
    assert_eq!(scheduler.in_flight(), 2);

    let correct = find(&branches, "A", Stage::Correct);
    let mask = find(&branches, "A", Stage::MaskClouds);

    let step = scheduler.step_completion(&ok_completion(mask, fake_output(Stage::MaskClouds, "A")));
    assert!(step.newly_scheduled.is_empty());
    assert!(!step.run_just_finished);
    assert_eq!(scheduler.phase_of("A"), Some(ItemPhase::Branches));

    let step = scheduler.step_completion(&ok_completion(correct, fake_output(Stage::Correct, "A")));
    assert!(step.run_just_finished);
    assert_eq!(scheduler.phase_of("A"), Some(ItemPhase::Done));
    assert!(scheduler.is_finished());

    let outcomes = scheduler.into_outcomes();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].upstream_failure.is_none());
    assert_eq!(outcomes[0].terminals.len(), 2);
    assert_eq!(outcomes[0].records.len(), 4);
}

#[test]
fn upstream_failure_marks_item_failed_and_schedules_nothing() {
    init_tracing();

    let mut scheduler = Scheduler::new(satellite(), ids(&["A", "B"]));
    let roots = scheduler.start();
    let a = find(&roots, "A", Stage::Acquire);
    let b = find(&roots, "B", Stage::Acquire);

    let step = scheduler.step_completion(&failed_completion(
        a,
        ErrorKind::Auth("401".to_string()),
    ));
    assert!(step.newly_scheduled.is_empty());
    assert_eq!(step.newly_failed, vec!["A".to_string()]);
    assert!(!step.run_just_finished);
    assert_eq!(scheduler.phase_of("A"), Some(ItemPhase::Failed));

    // B is unaffected.
    let next = scheduler.handle_completion(&ok_completion(b, "/data/B.zip"));
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].item, "B");

    let outcomes = scheduler.into_outcomes();
    let a = &outcomes[0];
    let failure = a.upstream_failure.as_ref().expect("A failed upstream");
    assert_eq!(failure.stage, Stage::Acquire);
    assert_eq!(failure.kind.name(), "AuthError");
    assert!(a.terminals.is_empty());
}

#[test]
fn terminal_failure_is_recorded_without_failing_the_item() {
    init_tracing();

    let mut scheduler = Scheduler::new(satellite(), ids(&["A"]));
    let roots = scheduler.start();
    let unpack = scheduler.handle_completion(&ok_completion(&roots[0], "/a.zip"));
    let branches = scheduler.handle_completion(&ok_completion(&unpack[0], "/l1c/A.SAFE"));

    let step = scheduler.step_completion(&failed_completion(
        find(&branches, "A", Stage::Correct),
        ErrorKind::Processing {
            status: Some(1),
            stderr: "sen2cor".to_string(),
        },
    ));
    assert!(step.newly_failed.is_empty());
    assert_eq!(scheduler.phase_of("A"), Some(ItemPhase::Branches));

    scheduler.handle_completion(&ok_completion(
        find(&branches, "A", Stage::MaskClouds),
        "/masks/A.tif",
    ));
    assert_eq!(scheduler.phase_of("A"), Some(ItemPhase::Done));

    let outcome = scheduler.into_outcomes().remove(0);
    assert!(outcome.upstream_failure.is_none());
    assert!(matches!(outcome.correct(), Some(Err(_))));
    assert!(matches!(outcome.mask_clouds(), Some(Ok(_))));
}

#[test]
fn stale_and_unknown_completions_are_ignored() {
    init_tracing();

    let mut scheduler = Scheduler::new(satellite(), ids(&["A"]));
    let roots = scheduler.start();

    let first = scheduler.handle_completion(&ok_completion(&roots[0], "/a.zip"));
    assert_eq!(first.len(), 1);

    // Same completion again: Acquire is no longer in flight.
    assert!(scheduler.handle_completion(&ok_completion(&roots[0], "/a.zip")).is_empty());

    let stranger = StageInvocation {
        item: "nobody".to_string(),
        stage: Stage::Acquire,
        seq: 99,
        input: StageValue::Product("nobody".to_string()),
    };
    assert!(scheduler.handle_completion(&ok_completion(&stranger, "/x.zip")).is_empty());
    assert_eq!(scheduler.in_flight(), 1);
}

#[test]
fn duplicate_ids_keep_first_position() {
    init_tracing();

    let mut scheduler = Scheduler::new(satellite(), ids(&["B", "A", "B"]));
    assert_eq!(scheduler.run().item_ids(), &["B".to_string(), "A".to_string()]);
    assert_eq!(scheduler.start().len(), 2);
}

#[test]
fn empty_batch_is_finished_once_started() {
    let mut scheduler = Scheduler::new(satellite(), Vec::new());
    assert!(!scheduler.is_finished());
    assert!(scheduler.start().is_empty());
    assert!(scheduler.is_finished());
}
