//! Directed weighted note graph built from a transition matrix.
//!
//! Wraps petgraph's `DiGraph` with note-index lookup. Nodes carry their note
//! label; edge weights are the matrix entries, unchanged.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::matrix::{TransitionMatrix, note_label};

/// Options for graph construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphOptions {
    /// Keep nodes with no incoming or outgoing edges.
    pub show_isolated_nodes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteNode {
    pub index: usize,
    pub label: String,
}

/// Serializable node for the visualization layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub index: usize,
    pub label: String,
    pub in_degree: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeSnapshot {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
}

/// Serializable snapshot of the entire graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

pub struct TransitionGraph {
    inner: DiGraph<NoteNode, f64>,
    index_map: HashMap<usize, NodeIndex>,
}

impl TransitionGraph {
    /// Build a graph from a matrix, dropping isolated nodes unless
    /// `options.show_isolated_nodes` is set.
    pub fn from_matrix(matrix: &TransitionMatrix, options: GraphOptions) -> Self {
        let n = matrix.size();
        let mut inner = DiGraph::with_capacity(n, matrix.edge_count());
        let mut index_map = HashMap::with_capacity(n);

        for i in 0..n {
            if !options.show_isolated_nodes && is_isolated(matrix, i) {
                continue;
            }
            let node = inner.add_node(NoteNode {
                index: i,
                label: note_label(i),
            });
            index_map.insert(i, node);
        }

        for i in 0..n {
            for j in 0..n {
                let weight = matrix.get(i, j);
                if weight == 0.0 {
                    continue;
                }
                // Both endpoints exist: an edge makes them non-isolated
                if let (Some(&a), Some(&b)) = (index_map.get(&i), index_map.get(&j)) {
                    inner.add_edge(a, b, weight);
                }
            }
        }

        log::debug!(
            "Built graph: {} nodes, {} edges (isolated nodes {})",
            inner.node_count(),
            inner.edge_count(),
            if options.show_isolated_nodes { "kept" } else { "dropped" }
        );

        Self { inner, index_map }
    }

    /// Graph over every matrix index, isolated nodes included.
    pub fn full(matrix: &TransitionMatrix) -> Self {
        Self::from_matrix(
            matrix,
            GraphOptions {
                show_isolated_nodes: true,
            },
        )
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.index_map.contains_key(&index)
    }

    /// Note indices present in the graph, ascending.
    pub fn nodes(&self) -> Vec<usize> {
        let mut nodes: Vec<usize> = self.inner.node_indices().map(|n| self.inner[n].index).collect();
        nodes.sort_unstable();
        nodes
    }

    /// `(source, target, weight)` triples in note-index space.
    pub fn edges(&self) -> Vec<(usize, usize, f64)> {
        self.inner
            .edge_references()
            .map(|e| {
                (
                    self.inner[e.source()].index,
                    self.inner[e.target()].index,
                    *e.weight(),
                )
            })
            .collect()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.index_map
            .get(&index)
            .map(|&n| self.inner[n].label.as_str())
    }

    /// Unweighted count of incoming edges, self-loop included.
    pub fn in_degree(&self, index: usize) -> usize {
        self.index_map
            .get(&index)
            .map(|&n| self.inner.edges_directed(n, Direction::Incoming).count())
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .nodes()
            .into_iter()
            .map(|index| NodeSnapshot {
                index,
                label: note_label(index),
                in_degree: self.in_degree(index),
            })
            .collect();
        let edges = self
            .edges()
            .into_iter()
            .map(|(source, target, weight)| EdgeSnapshot {
                source,
                target,
                weight,
            })
            .collect();
        GraphSnapshot { nodes, edges }
    }

    pub(crate) fn inner(&self) -> &DiGraph<NoteNode, f64> {
        &self.inner
    }
}

/// No nonzero entry in row `i` or column `i`.
fn is_isolated(matrix: &TransitionMatrix, i: usize) -> bool {
    let n = matrix.size();
    (0..n).all(|j| matrix.get(i, j) == 0.0 && matrix.get(j, i) == 0.0)
}
