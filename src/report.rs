//! One-shot analysis of a single (input, channel, mode) triple.

use std::path::Path;

use serde::Serialize;

use crate::builder::{self, BuildError};
use crate::centrality::Centralities;
use crate::events::{Mode, NoteEvent};
use crate::graph::{GraphOptions, GraphSnapshot, TransitionGraph};
use crate::matrix::TransitionMatrix;
use crate::stats::GraphStats;

/// What to analyze and how to present the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalysisOptions {
    pub channel: i32,
    pub mode: Mode,
    pub graph: GraphOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub channel: i32,
    pub mode: Mode,
    pub transition_matrix: TransitionMatrix,
    /// Presentation graph; honours `show_isolated_nodes`.
    pub graph: GraphSnapshot,
    /// Always computed on the full matrix.
    pub stats: GraphStats,
    /// Always computed on the unfiltered graph.
    pub centrality: Centralities,
}

/// Compact per-file line for batch runs.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub file: String,
    pub channel: i32,
    pub mode: Mode,
    pub nodes: usize,
    pub edges: usize,
    pub average_clustering: f64,
    pub diameter: usize,
    pub giant_component_size: usize,
    /// Highest eigenvector-centrality note, by label.
    pub most_central: Option<String>,
}

impl AnalysisReport {
    /// Analyze an already-built matrix.
    ///
    /// Statistics and centralities are independent reads of the same matrix
    /// and run on separate rayon workers.
    pub fn from_matrix(matrix: TransitionMatrix, options: AnalysisOptions) -> Self {
        let (stats, centrality) = rayon::join(
            || GraphStats::compute(&matrix),
            || Centralities::from_matrix(&matrix),
        );
        let graph = TransitionGraph::from_matrix(&matrix, options.graph).snapshot();

        Self {
            channel: options.channel,
            mode: options.mode,
            transition_matrix: matrix,
            graph,
            stats,
            centrality,
        }
    }

    pub fn from_events(events: &[NoteEvent], options: AnalysisOptions) -> Result<Self, BuildError> {
        let matrix = builder::build_transition_matrix(events, options.channel, options.mode)?;
        Ok(Self::from_matrix(matrix, options))
    }

    pub fn from_file(path: &Path, options: AnalysisOptions) -> Result<Self, BuildError> {
        let matrix = builder::build_from_file(path, options.channel, options.mode)?;
        Ok(Self::from_matrix(matrix, options))
    }

    pub fn summary(&self, file: &str) -> ReportSummary {
        let most_central = self
            .centrality
            .eigenvector
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(&index, _)| crate::matrix::note_label(index));

        ReportSummary {
            file: file.to_string(),
            channel: self.channel,
            mode: self.mode,
            nodes: self.graph.nodes.len(),
            edges: self.graph.edges.len(),
            average_clustering: self.stats.average_clustering,
            diameter: self.stats.diameter,
            giant_component_size: self.stats.giant_component_size,
            most_central,
        }
    }
}
