// tests/stage_graph.rs

use s2flow::dag::{StageGraph, SATELLITE_EDGES};
use s2flow::errors::PipelineError;
use s2flow::types::Stage;

fn graph_error(edges: &[(Stage, Stage)]) -> String {
    match StageGraph::from_edges(edges) {
        Err(PipelineError::StageGraph(msg)) => msg,
        Err(e) => panic!("Expected StageGraph error, got: {e:?}"),
        Ok(g) => panic!("Expected error, got graph {g:?}"),
    }
}

#[test]
fn satellite_graph_shape() {
    let g = StageGraph::satellite().unwrap();

    assert_eq!(g.root(), Stage::Acquire);
    assert_eq!(g.stages().collect::<Vec<_>>(), Stage::ALL.to_vec());
    assert_eq!(g.dependency_of(Stage::Acquire), None);
    assert_eq!(g.dependency_of(Stage::Unpack), Some(Stage::Acquire));
    assert_eq!(g.dependency_of(Stage::Correct), Some(Stage::Unpack));
    assert_eq!(g.dependency_of(Stage::MaskClouds), Some(Stage::Unpack));
    assert_eq!(g.dependents_of(Stage::Unpack), &[Stage::Correct, Stage::MaskClouds]);
    assert_eq!(g.terminals(), vec![Stage::Correct, Stage::MaskClouds]);
    assert!(!g.is_terminal(Stage::Unpack));
    assert_eq!(g.edges(), SATELLITE_EDGES.to_vec());
}

#[test]
fn validated_satellite_edges_match_builtin() {
    let g = StageGraph::from_edges(&SATELLITE_EDGES).unwrap();
    assert_eq!(g.edges(), StageGraph::satellite().unwrap().edges());
    assert_eq!(g.root(), Stage::Acquire);
}

#[test]
fn shorter_chain_is_accepted() {
    let g = StageGraph::from_edges(&[(Stage::Acquire, Stage::Unpack)]).unwrap();
    assert_eq!(g.terminals(), vec![Stage::Unpack]);
    assert!(!g.contains(Stage::Correct));
    assert!(!g.is_terminal(Stage::Correct));
}

#[test]
fn empty_graph_is_rejected() {
    assert!(graph_error(&[]).contains("at least one edge"));
}

#[test]
fn stage_with_two_inputs_is_rejected() {
    let msg = graph_error(&[
        (Stage::Acquire, Stage::Correct),
        (Stage::Unpack, Stage::Correct),
    ]);
    assert!(msg.contains("more than one input"));
}

#[test]
fn cycle_is_rejected() {
    let msg = graph_error(&[(Stage::Acquire, Stage::Unpack), (Stage::Unpack, Stage::Acquire)]);
    assert!(msg.contains("cycle detected"));
}

#[test]
fn forest_with_two_roots_is_rejected() {
    let msg = graph_error(&[
        (Stage::Acquire, Stage::Unpack),
        (Stage::Correct, Stage::MaskClouds),
    ]);
    assert!(msg.contains("exactly one root"));
}
