//! Sub-analyzer DAG
//!
//! Sub-analyzers declare their prerequisites; the coordinator computes a
//! topological order once and memoizes each stage's result per package.
//! The enum keeps the stage set closed, so a forgotten dependency is a
//! compile error at the match sites rather than a runtime surprise.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::shared::models::{NilscanError, Result};

/// Sub-analyzer identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageId {
    /// Package directives and mode selection
    Directives,
    /// Handwritten and inferred function contracts
    Contracts,
    /// Interface covariance/contravariance triggers
    Affiliation,
    /// Package-level variable initialization triggers
    Globals,
    /// Per-function backpropagation
    Functions,
    /// Implication-graph solving and fact export
    Inference,
    /// Conflict grouping, rendering and nolint filtering
    Diagnostics,
}

impl StageId {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Directives => "directives",
            Self::Contracts => "contracts",
            Self::Affiliation => "affiliation",
            Self::Globals => "globals",
            Self::Functions => "functions",
            Self::Inference => "inference",
            Self::Diagnostics => "diagnostics",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Directives => "Parse package directives and select the inference mode",
            Self::Contracts => "Collect handwritten contracts and infer nonnil contracts",
            Self::Affiliation => "Relate interface and implementation sites",
            Self::Globals => "Check package-level variable initializers",
            Self::Functions => "Backpropagate non-nil obligations per function",
            Self::Inference => "Solve the implication graph and export facts",
            Self::Diagnostics => "Group, render and filter diagnostics",
        }
    }

    /// Prerequisite stages whose results this stage consumes.
    pub fn requires(&self) -> &'static [StageId] {
        match self {
            Self::Directives => &[],
            Self::Contracts => &[],
            Self::Affiliation => &[],
            Self::Globals => &[],
            Self::Functions => &[StageId::Directives, StageId::Contracts],
            Self::Inference => &[
                StageId::Directives,
                StageId::Functions,
                StageId::Affiliation,
                StageId::Globals,
            ],
            Self::Diagnostics => &[StageId::Directives, StageId::Inference],
        }
    }

    pub const ALL: [StageId; 7] = [
        StageId::Directives,
        StageId::Contracts,
        StageId::Affiliation,
        StageId::Globals,
        StageId::Functions,
        StageId::Inference,
        StageId::Diagnostics,
    ];
}

/// Stage execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// A prerequisite failed
    Skipped,
}

#[derive(Debug, Clone)]
pub struct StageNode {
    pub id: StageId,
    pub state: StageState,
    pub duration: Option<Duration>,
    pub error: Option<String>,
}

impl StageNode {
    pub fn new(id: StageId) -> Self {
        Self {
            id,
            state: StageState::Pending,
            duration: None,
            error: None,
        }
    }
}

/// The stage dependency graph, with a precomputed execution order.
#[derive(Debug)]
pub struct StageDag {
    pub nodes: FxHashMap<StageId, StageNode>,
    order: Vec<StageId>,
}

impl StageDag {
    pub fn new() -> Result<Self> {
        let mut graph: DiGraph<StageId, ()> = DiGraph::new();
        let mut index: FxHashMap<StageId, NodeIndex> = FxHashMap::default();
        for id in StageId::ALL {
            index.insert(id, graph.add_node(id));
        }
        for id in StageId::ALL {
            for dep in id.requires() {
                graph.add_edge(index[dep], index[&id], ());
            }
        }
        let order = toposort(&graph, None)
            .map_err(|c| {
                NilscanError::internal(format!(
                    "stage dependency cycle through {}",
                    graph[c.node_id()].name()
                ))
            })?
            .into_iter()
            .map(|n| graph[n])
            .collect();

        let nodes = StageId::ALL
            .into_iter()
            .map(|id| (id, StageNode::new(id)))
            .collect();
        Ok(Self { nodes, order })
    }

    /// Stages in dependency order.
    pub fn execution_order(&self) -> &[StageId] {
        &self.order
    }

    /// Whether all of `id`'s prerequisites succeeded.
    pub fn deps_succeeded(&self, id: StageId) -> bool {
        id.requires()
            .iter()
            .all(|d| self.nodes[d].state == StageState::Succeeded)
    }

    pub fn mark(&mut self, id: StageId, state: StageState) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.state = state;
        }
    }

    pub fn record(&mut self, id: StageId, duration: Duration, error: Option<String>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.duration = Some(duration);
            node.state = if error.is_some() {
                StageState::Failed
            } else {
                StageState::Succeeded
            };
            node.error = error;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_respects_dependencies() {
        let dag = StageDag::new().unwrap();
        let order = dag.execution_order();
        let pos =
            |id: StageId| order.iter().position(|s| *s == id).expect("stage in order");

        for id in StageId::ALL {
            for dep in id.requires() {
                assert!(pos(*dep) < pos(id), "{} must run before {}", dep.name(), id.name());
            }
        }
    }

    #[test]
    fn test_all_stages_present_once() {
        let dag = StageDag::new().unwrap();
        assert_eq!(dag.execution_order().len(), StageId::ALL.len());
    }

    #[test]
    fn test_deps_succeeded_tracking() {
        let mut dag = StageDag::new().unwrap();
        assert!(!dag.deps_succeeded(StageId::Functions));
        dag.mark(StageId::Directives, StageState::Succeeded);
        dag.mark(StageId::Contracts, StageState::Succeeded);
        assert!(dag.deps_succeeded(StageId::Functions));
    }
}
