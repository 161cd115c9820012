//! Per-program dependency graph (spec.md §3.4, §4.3.1).
//!
//! A [`DepGraph`] tracks which file depends on which (via `use` imports and
//! cross-file calls) and drives leaves-first generation order: a file can
//! only be lowered once every file it depends on has already been lowered.
//! Built on `petgraph::StableGraph`, generalizing the teacher's
//! `ProgramGraph` (which combines this with a computational graph) down to
//! just the dependency-ordering concern this spec needs.

use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{DepNodeId, FileId};

/// A node in the per-file dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepNode {
    pub file: FileId,
}

/// The program's dependency graph: an edge `a -> b` means "file `a` depends
/// on file `b`" (`b` must be generated first). Generation order is the
/// reverse topological order, i.e. leaves (files with no outgoing edges)
/// first (spec.md §4.3.1: "walking the dependency graph leaves-first").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepGraph {
    graph: StableGraph<DepNode, (), petgraph::Directed, u32>,
    root: Option<DepNodeId>,
}

impl DepGraph {
    pub fn new() -> Self {
        DepGraph::default()
    }

    /// Adds a file's dependency node, returning its id.
    pub fn add_node(&mut self, file: FileId) -> DepNodeId {
        let idx = self.graph.add_node(DepNode { file });
        let id = DepNodeId::from(idx);
        if self.root.is_none() {
            self.root = Some(id);
        }
        id
    }

    /// Records that `from` depends on `to` (`to` must be generated first).
    pub fn add_dependency(&mut self, from: DepNodeId, to: DepNodeId) {
        self.graph.add_edge(from.into(), to.into(), ());
    }

    pub fn node_file(&self, id: DepNodeId) -> FileId {
        self.graph[NodeIndex::<u32>::from(id)].file
    }

    /// Every definition must be reachable from the root `DepNode` (spec.md
    /// §3.4 invariant). Returns the set of unreachable nodes, if any.
    pub fn unreachable_from_root(&self) -> Result<Vec<DepNodeId>, CoreError> {
        let Some(root) = self.root else {
            return Ok(Vec::new());
        };
        let mut reached = vec![false; self.graph.node_count()];
        let mut stack = vec![NodeIndex::<u32>::from(root)];
        while let Some(n) = stack.pop() {
            if reached[n.index()] {
                continue;
            }
            reached[n.index()] = true;
            for neighbor in self.graph.neighbors_directed(n, Direction::Outgoing) {
                stack.push(neighbor);
            }
        }
        Ok(self
            .graph
            .node_indices()
            .filter(|n| !reached[n.index()])
            .map(DepNodeId::from)
            .collect())
    }

    /// Leaves-first generation order: files with no un-generated
    /// dependencies come first. Returns [`CoreError::DependencyCycle`] if
    /// the graph is not a DAG.
    pub fn generation_order(&self) -> Result<Vec<DepNodeId>, CoreError> {
        // toposort gives an order where edges point from later to earlier;
        // since our edges mean "depends on" (from -> to, to first), the
        // toposort order already has dependencies before dependents once
        // reversed -- petgraph's toposort yields nodes with no incoming
        // edges first, i.e. nodes nothing depends on first. We want the
        // opposite (nodes that depend on nothing, i.e. no outgoing edges,
        // first), so reverse the direction when sorting.
        let mut reversed = self.graph.clone();
        reversed.reverse();
        match toposort(&reversed, None) {
            Ok(order) => Ok(order.into_iter().map(DepNodeId::from).collect()),
            Err(cycle) => Err(CoreError::DependencyCycle {
                id: DepNodeId::from(cycle.node_id()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_generated_before_dependents() {
        let mut graph = DepGraph::new();
        let a = graph.add_node(FileId(0)); // main, depends on b
        let b = graph.add_node(FileId(1)); // helper, a leaf
        graph.add_dependency(a, b);

        let order = graph.generation_order().unwrap();
        let pos_a = order.iter().position(|&n| n == a).unwrap();
        let pos_b = order.iter().position(|&n| n == b).unwrap();
        assert!(pos_b < pos_a, "leaf file must generate before its dependent");
    }

    #[test]
    fn cycle_is_detected() {
        let mut graph = DepGraph::new();
        let a = graph.add_node(FileId(0));
        let b = graph.add_node(FileId(1));
        graph.add_dependency(a, b);
        graph.add_dependency(b, a);
        assert!(matches!(graph.generation_order(), Err(CoreError::DependencyCycle { .. })));
    }

    #[test]
    fn all_nodes_reachable_from_root() {
        let mut graph = DepGraph::new();
        let a = graph.add_node(FileId(0));
        let b = graph.add_node(FileId(1));
        graph.add_dependency(a, b);
        assert!(graph.unreachable_from_root().unwrap().is_empty());
    }
}
