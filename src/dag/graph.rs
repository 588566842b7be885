use std::collections::BTreeMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{PipelineError, Result};
use crate::types::Stage;

/// Edges of the satellite pipeline: one chain that splits after Unpack.
pub const SATELLITE_EDGES: [(Stage, Stage); 3] = [
    (Stage::Acquire, Stage::Unpack),
    (Stage::Unpack, Stage::Correct),
    (Stage::Unpack, Stage::MaskClouds),
];

/// Internal node structure: the stage's single input and its consumers.
#[derive(Debug, Clone, Default)]
struct StageNode {
    /// The stage whose output this stage consumes (`None` for the root).
    dependency: Option<Stage>,
    /// Stages that consume this stage's output, in stage order.
    dependents: Vec<Stage>,
}

/// Per-item dependency graph, shared by every item of a batch.
///
/// Every stage takes exactly one input value, so each node has at most one
/// dependency, and exactly one node (the root) takes the product identifier.
#[derive(Debug, Clone)]
pub struct StageGraph {
    nodes: BTreeMap<Stage, StageNode>,
    root: Stage,
}

impl StageGraph {
    /// `Acquire -> Unpack -> {Correct, MaskClouds}`, validated like any
    /// other edge list.
    pub fn satellite() -> Result<Self> {
        Self::from_edges(&SATELLITE_EDGES)
    }

    /// Build and validate a graph from `(dependency, dependent)` edges.
    ///
    /// Rejects empty graphs, stages with more than one input, graphs with
    /// zero or several roots, and cycles.
    pub fn from_edges(edges: &[(Stage, Stage)]) -> Result<Self> {
        if edges.is_empty() {
            return Err(PipelineError::StageGraph(
                "stage graph must contain at least one edge".to_string(),
            ));
        }

        let mut graph: DiGraphMap<Stage, ()> = DiGraphMap::new();
        let mut inputs: BTreeMap<Stage, Stage> = BTreeMap::new();

        for &(from, to) in edges {
            if let Some(previous) = inputs.insert(to, from) {
                if previous != from {
                    return Err(PipelineError::StageGraph(format!(
                        "stage {to} has more than one input ({previous} and {from})"
                    )));
                }
            }
            graph.add_edge(from, to, ());
        }

        if let Err(cycle) = toposort(&graph, None) {
            return Err(PipelineError::StageGraph(format!(
                "cycle detected in stage graph involving stage {}",
                cycle.node_id()
            )));
        }

        let roots: Vec<Stage> = graph
            .nodes()
            .filter(|stage| !inputs.contains_key(stage))
            .collect();
        match roots.as_slice() {
            [root] => Ok(Self::build_unchecked(edges, *root)),
            [] => Err(PipelineError::StageGraph(
                "stage graph has no root stage".to_string(),
            )),
            many => Err(PipelineError::StageGraph(format!(
                "stage graph must have exactly one root stage, found {many:?}"
            ))),
        }
    }

    fn build_unchecked(edges: &[(Stage, Stage)], root: Stage) -> Self {
        let mut nodes: BTreeMap<Stage, StageNode> = BTreeMap::new();
        nodes.entry(root).or_default();

        for &(from, to) in edges {
            let dependents = &mut nodes.entry(from).or_default().dependents;
            if !dependents.contains(&to) {
                dependents.push(to);
                dependents.sort();
            }
            nodes.entry(to).or_default().dependency = Some(from);
        }

        Self { nodes, root }
    }

    /// The stage that receives the product identifier.
    pub fn root(&self) -> Stage {
        self.root
    }

    /// All stages in the graph, in stage order.
    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.nodes.keys().copied()
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.nodes.contains_key(&stage)
    }

    /// The stage whose output `stage` consumes.
    pub fn dependency_of(&self, stage: Stage) -> Option<Stage> {
        self.nodes.get(&stage).and_then(|n| n.dependency)
    }

    /// Stages fed by `stage`'s output.
    pub fn dependents_of(&self, stage: Stage) -> &[Stage] {
        self.nodes
            .get(&stage)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// A stage is terminal when nothing consumes its output.
    pub fn is_terminal(&self, stage: Stage) -> bool {
        self.contains(stage) && self.dependents_of(stage).is_empty()
    }

    pub fn terminals(&self) -> Vec<Stage> {
        self.stages().filter(|s| self.is_terminal(*s)).collect()
    }

    /// `(dependency, dependent)` pairs, in stage order.
    pub fn edges(&self) -> Vec<(Stage, Stage)> {
        self.nodes
            .iter()
            .flat_map(|(from, node)| node.dependents.iter().map(move |to| (*from, *to)))
            .collect()
    }
}
