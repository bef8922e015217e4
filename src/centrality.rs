//! Node-importance measures on the directed weighted note graph.
//!
//! Every measure runs on the full graph of a matrix, isolated notes included,
//! so normalization always uses the matrix size. All three key their results
//! by note index and return an empty map for a graph with no edges. Scores are
//! normalized into [0, 1].
//!
//! Betweenness uses transition probabilities directly as path lengths, so a
//! rare transition counts as a *short* hop.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use nalgebra::DMatrix;
use nalgebra::linalg::Schur;
use petgraph::Direction;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use serde::Serialize;

use crate::graph::TransitionGraph;
use crate::matrix::TransitionMatrix;

/// Note index → normalized score.
pub type Centrality = BTreeMap<usize, f64>;

const POWER_MAX_ITER: usize = 1000;
const POWER_TOLERANCE: f64 = 1e-6;
/// Iteration cap shared by the Schur and SVD solvers.
const DENSE_MAX_ITER: usize = 10_000;

/// The three centrality maps for one matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Centralities {
    pub degree: Centrality,
    pub betweenness: Centrality,
    pub eigenvector: Centrality,
}

impl Centralities {
    /// Centralities over the full, unfiltered graph of `matrix`.
    pub fn from_matrix(matrix: &TransitionMatrix) -> Self {
        let graph = TransitionGraph::full(matrix);
        Self {
            degree: degree_on(&graph),
            betweenness: betweenness_on(&graph),
            eigenvector: eigenvector_on(&graph, POWER_MAX_ITER),
        }
    }
}

/// In-degree centrality: incoming edges from other nodes over `n - 1`.
///
/// Edges count once regardless of weight. Self-loops are not counted, which
/// keeps every score within [0, 1].
pub fn degree_centrality(matrix: &TransitionMatrix) -> Centrality {
    degree_on(&TransitionGraph::full(matrix))
}

/// Shortest-path betweenness (Brandes), edge weight as distance.
///
/// Normalized by `1 / ((n - 1)(n - 2))`, the number of ordered pairs not
/// involving the node. Graphs with two or fewer nodes score zero everywhere.
pub fn betweenness_centrality(matrix: &TransitionMatrix) -> Centrality {
    betweenness_on(&TransitionGraph::full(matrix))
}

/// Eigenvector centrality from the dominant eigenvector of the weighted
/// adjacency matrix (in-edge convention: a node is important when important
/// nodes transition into it).
///
/// Power iteration first; if it fails to converge within the iteration cap
/// the exact dense solver takes over. The result has unit L2 norm and is
/// clipped to [0, 1].
pub fn eigenvector_centrality(matrix: &TransitionMatrix) -> Centrality {
    eigenvector_on(&TransitionGraph::full(matrix), POWER_MAX_ITER)
}

fn is_degenerate(graph: &TransitionGraph) -> bool {
    graph.node_count() == 0 || graph.edge_count() == 0
}

/// Map dense petgraph positions back to note indices.
fn keyed(graph: &TransitionGraph, scores: Vec<f64>) -> Centrality {
    let inner = graph.inner();
    scores
        .into_iter()
        .enumerate()
        .map(|(pos, score)| (inner[NodeIndex::new(pos)].index, score))
        .collect()
}

fn degree_on(graph: &TransitionGraph) -> Centrality {
    if is_degenerate(graph) {
        return Centrality::new();
    }
    let inner = graph.inner();
    let n = inner.node_count();
    let scale = if n > 1 { 1.0 / (n - 1) as f64 } else { 0.0 };

    let scores = inner
        .node_indices()
        .map(|v| {
            let incoming = inner
                .edges_directed(v, Direction::Incoming)
                .filter(|e| e.source() != v)
                .count();
            incoming as f64 * scale
        })
        .collect();
    keyed(graph, scores)
}

/// Min-heap entry for Dijkstra. `seq` breaks distance ties in push order.
struct Frontier {
    dist: f64,
    seq: usize,
    node: usize,
    pred: Option<usize>,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

fn betweenness_on(graph: &TransitionGraph) -> Centrality {
    if is_degenerate(graph) {
        return Centrality::new();
    }
    let inner = graph.inner();
    let n = inner.node_count();

    let adjacency: Vec<Vec<(usize, f64)>> = inner
        .node_indices()
        .map(|v| {
            inner
                .edges(v)
                .map(|e| (e.target().index(), *e.weight()))
                .collect()
        })
        .collect();

    let mut betweenness = vec![0.0; n];
    for source in 0..n {
        accumulate_from(&adjacency, source, &mut betweenness);
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        for b in &mut betweenness {
            *b *= scale;
        }
    } else {
        betweenness.iter_mut().for_each(|b| *b = 0.0);
    }

    keyed(graph, betweenness)
}

/// Single-source Dijkstra with path counting, then dependency accumulation.
fn accumulate_from(adjacency: &[Vec<(usize, f64)>], source: usize, betweenness: &mut [f64]) {
    let n = adjacency.len();
    let mut settled: Vec<Option<f64>> = vec![None; n];
    let mut tentative: Vec<Option<f64>> = vec![None; n];
    let mut sigma = vec![0.0_f64; n];
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut order: Vec<usize> = Vec::with_capacity(n);

    sigma[source] = 1.0;
    tentative[source] = Some(0.0);
    let mut heap = BinaryHeap::new();
    let mut seq = 0;
    heap.push(Frontier {
        dist: 0.0,
        seq,
        node: source,
        pred: None,
    });

    while let Some(Frontier { dist, node: v, pred, .. }) = heap.pop() {
        if settled[v].is_some() {
            continue;
        }
        if let Some(p) = pred {
            sigma[v] += sigma[p];
        }
        order.push(v);
        settled[v] = Some(dist);

        for &(w, weight) in &adjacency[v] {
            if settled[w].is_some() {
                continue;
            }
            let candidate = dist + weight;
            match tentative[w] {
                Some(best) if candidate == best => {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
                Some(best) if candidate > best => {}
                _ => {
                    tentative[w] = Some(candidate);
                    seq += 1;
                    heap.push(Frontier {
                        dist: candidate,
                        seq,
                        node: w,
                        pred: Some(v),
                    });
                    sigma[w] = 0.0;
                    preds[w] = vec![v];
                }
            }
        }
    }

    let mut delta = vec![0.0_f64; n];
    for &w in order.iter().rev() {
        let coeff = (1.0 + delta[w]) / sigma[w];
        for &v in &preds[w] {
            delta[v] += sigma[v] * coeff;
        }
        if w != source {
            betweenness[w] += delta[w];
        }
    }
}

fn eigenvector_on(graph: &TransitionGraph, max_iter: usize) -> Centrality {
    if is_degenerate(graph) {
        return Centrality::new();
    }
    let weights = weighted_adjacency(graph);

    let power = power_iteration(&weights, max_iter, POWER_TOLERANCE);
    let scores = if power.converged {
        power.vector
    } else if !is_cyclic_directed(graph.inner()) {
        // Acyclic: every eigenvalue is zero, so there is no dominant
        // eigenvector to solve for. Keep the iterate.
        log::debug!(
            "Power iteration did not converge in {} iterations on an acyclic graph, keeping last iterate",
            max_iter
        );
        power.vector
    } else {
        log::debug!(
            "Power iteration did not converge in {} iterations, using dense eigensolver",
            max_iter
        );
        match dense_eigenvector(&weights) {
            Some(x) => x,
            None => {
                log::debug!("Dense eigensolver hit its iteration cap, keeping last iterate");
                power.vector
            }
        }
    };

    keyed(graph, scores.into_iter().map(|s| s.clamp(0.0, 1.0)).collect())
}

/// Dense `w[i][j]` = weight of edge i → j, in petgraph node order.
fn weighted_adjacency(graph: &TransitionGraph) -> Vec<Vec<f64>> {
    let inner = graph.inner();
    let n = inner.node_count();
    let mut w = vec![vec![0.0; n]; n];
    for e in inner.edge_references() {
        w[e.source().index()][e.target().index()] = *e.weight();
    }
    w
}

struct PowerIteration {
    vector: Vec<f64>,
    converged: bool,
}

/// Iterate `x ← (A + I)ᵀ x`, L2-normalized each step, from a uniform start.
///
/// Converged when the summed absolute change drops below `n · tol`. The last
/// iterate is returned either way.
fn power_iteration(w: &[Vec<f64>], max_iter: usize, tol: f64) -> PowerIteration {
    let n = w.len();
    let mut x = vec![1.0 / n as f64; n];

    for _ in 0..max_iter {
        let last = x.clone();
        for (i, row) in w.iter().enumerate() {
            for (j, &weight) in row.iter().enumerate() {
                if weight != 0.0 {
                    x[j] += last[i] * weight;
                }
            }
        }

        let norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
        let norm = if norm == 0.0 { 1.0 } else { norm };
        for v in &mut x {
            *v /= norm;
        }

        let change: f64 = x.iter().zip(&last).map(|(a, b)| (a - b).abs()).sum();
        if change < n as f64 * tol {
            return PowerIteration {
                vector: x,
                converged: true,
            };
        }
    }
    PowerIteration {
        vector: x,
        converged: false,
    }
}

/// Exact eigenvector of Aᵀ for its largest real eigenvalue.
///
/// The eigenvalue comes from the real Schur form; the eigenvector is the
/// right singular vector of `Aᵀ - λI` with the smallest singular value. The
/// sign is chosen so the entries sum positive, then scaled to unit L2 norm.
/// `None` when either decomposition exceeds `DENSE_MAX_ITER`.
fn dense_eigenvector(w: &[Vec<f64>]) -> Option<Vec<f64>> {
    let n = w.len();
    let transposed = DMatrix::from_fn(n, n, |i, j| w[j][i]);

    let schur = Schur::try_new(transposed.clone(), f64::EPSILON, DENSE_MAX_ITER)?;
    let lambda = schur
        .complex_eigenvalues()
        .iter()
        .map(|c| c.re)
        .fold(f64::NEG_INFINITY, f64::max);

    let shifted = transposed - DMatrix::identity(n, n) * lambda;
    let svd = shifted.try_svd(false, true, f64::EPSILON, DENSE_MAX_ITER)?;
    let v_t = svd.v_t?;
    let smallest = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)?;

    let mut x: Vec<f64> = v_t.row(smallest).iter().copied().collect();
    let sum: f64 = x.iter().sum();
    let norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    let scale = if sum < 0.0 { -norm } else { norm };
    for v in &mut x {
        *v /= scale;
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&[f64]]) -> TransitionMatrix {
        TransitionMatrix::from_rows(&rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>()).unwrap()
    }

    fn cycle4() -> TransitionMatrix {
        matrix(&[
            &[0.0, 1.0, 0.0, 0.0],
            &[0.0, 0.0, 1.0, 0.0],
            &[0.0, 0.0, 0.0, 1.0],
            &[1.0, 0.0, 0.0, 0.0],
        ])
    }

    fn all_in_unit_range(c: &Centrality) -> bool {
        c.values().all(|&v| (0.0..=1.0).contains(&v))
    }

    #[test]
    fn test_cycle_betweenness_symmetric() {
        let b = betweenness_centrality(&cycle4());
        assert_eq!(b.len(), 4);
        // Each node lies on 3 of the 6 ordered pairs that exclude it
        for v in b.values() {
            assert!((v - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn test_cycle_eigenvector_uniform() {
        let e = eigenvector_centrality(&cycle4());
        for v in e.values() {
            assert!((v - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_degree_centrality() {
        let m = matrix(&[
            &[0.0, 0.5, 0.5, 0.0],
            &[0.0, 0.0, 1.0, 0.0],
            &[0.0, 0.0, 0.5, 0.5],
            &[1.0, 0.0, 0.0, 0.0],
        ]);
        let d = degree_centrality(&m);
        assert!((d[&0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((d[&1] - 1.0 / 3.0).abs() < 1e-12);
        // Self-loop on 2 is not an incoming edge from another node
        assert!((d[&2] - 2.0 / 3.0).abs() < 1e-12);
        assert!((d[&3] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_degree_centrality_stays_in_range_with_self_loop() {
        let mut rows = vec![vec![0.0; 3]; 3];
        for row in rows.iter_mut() {
            row[0] = 1.0;
        }
        let m = TransitionMatrix::from_rows(&rows).unwrap();
        let d = degree_centrality(&m);
        assert_eq!(d[&0], 1.0);
    }

    #[test]
    fn test_empty_graph_returns_empty_maps() {
        let c = Centralities::from_matrix(&TransitionMatrix::zeros(48));
        assert!(c.degree.is_empty());
        assert!(c.betweenness.is_empty());
        assert!(c.eigenvector.is_empty());

        let none = Centralities::from_matrix(&TransitionMatrix::zeros(0));
        assert!(none.degree.is_empty());
    }

    #[test]
    fn test_one_entry_per_node() {
        let mut rows = vec![vec![0.0; 48]; 48];
        rows[0][2] = 1.0;
        rows[2][0] = 1.0;
        let c = Centralities::from_matrix(&TransitionMatrix::from_rows(&rows).unwrap());
        assert_eq!(c.degree.len(), 48);
        assert_eq!(c.betweenness.len(), 48);
        assert_eq!(c.eigenvector.len(), 48);
        assert!(all_in_unit_range(&c.degree));
        assert!(all_in_unit_range(&c.betweenness));
        assert!(all_in_unit_range(&c.eigenvector));
    }

    #[test]
    fn test_betweenness_prefers_low_weight_paths() {
        // 0 → 2 directly costs 0.9; 0 → 1 → 2 costs 0.1 + 0.1.
        // Probabilities are used as distances, so the detour through 1 is shortest.
        let m = matrix(&[
            &[0.0, 0.1, 0.9],
            &[0.0, 0.0, 0.1],
            &[0.0, 0.0, 0.0],
        ]);
        let b = betweenness_centrality(&m);
        // Only pair (0, 2) routes through 1; normalized by (n-1)(n-2) = 2
        assert!((b[&1] - 0.5).abs() < 1e-12);
        assert_eq!(b[&0], 0.0);
        assert_eq!(b[&2], 0.0);
    }

    #[test]
    fn test_betweenness_splits_equal_paths() {
        // Two equal-cost routes 0 → 1 → 3 and 0 → 2 → 3
        let m = matrix(&[
            &[0.0, 0.5, 0.5, 0.0],
            &[0.0, 0.0, 0.0, 1.0],
            &[0.0, 0.0, 0.0, 1.0],
            &[0.0, 0.0, 0.0, 0.0],
        ]);
        let b = betweenness_centrality(&m);
        // Half of one pair each, over (3 * 2) ordered pairs
        assert!((b[&1] - 0.5 / 6.0).abs() < 1e-12);
        assert!((b[&2] - 0.5 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_betweenness_two_nodes_is_zero() {
        let m = matrix(&[&[0.0, 1.0], &[1.0, 0.0]]);
        let b = betweenness_centrality(&m);
        assert_eq!(b, Centrality::from([(0, 0.0), (1, 0.0)]));
    }

    #[test]
    fn test_dense_solver_matches_power_iteration() {
        // Strongly connected and aperiodic: unique Perron vector
        let w = vec![
            vec![0.0, 1.0, 0.5],
            vec![0.0, 0.0, 1.0],
            vec![1.0, 0.0, 0.0],
        ];
        let power = power_iteration(&w, POWER_MAX_ITER, POWER_TOLERANCE);
        assert!(power.converged);
        let dense = dense_eigenvector(&w).unwrap();
        for (p, d) in power.vector.iter().zip(&dense) {
            assert!((p - d).abs() < 1e-4, "power {} vs dense {}", p, d);
        }
        let norm: f64 = dense.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_power_iteration_cap_reports_failure() {
        let w = vec![
            vec![0.0, 1.0, 0.5],
            vec![0.0, 0.0, 1.0],
            vec![1.0, 0.0, 0.0],
        ];
        let power = power_iteration(&w, 1, POWER_TOLERANCE);
        assert!(!power.converged);
        assert_eq!(power.vector.len(), 3);
    }

    fn chromatic_run() -> TransitionMatrix {
        // C2 → C#2 → ... → B5: nilpotent, power iteration never settles
        let mut rows = vec![vec![0.0; 48]; 48];
        for i in 0..47 {
            rows[i][i + 1] = 1.0;
        }
        TransitionMatrix::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_eigenvector_on_acyclic_run_is_bounded() {
        let m = chromatic_run();
        let weights = weighted_adjacency(&TransitionGraph::full(&m));
        assert!(!power_iteration(&weights, POWER_MAX_ITER, POWER_TOLERANCE).converged);

        let e = eigenvector_centrality(&m);
        assert_eq!(e.len(), 48);
        assert!(all_in_unit_range(&e));
        // Mass drifts toward the end of the run
        assert!(e[&47] > e[&0]);
    }

    #[test]
    fn test_chromatic_run_through_bundle() {
        let c = Centralities::from_matrix(&chromatic_run());
        assert_eq!(c.eigenvector.len(), 48);
        assert!(all_in_unit_range(&c.eigenvector));
        assert!(all_in_unit_range(&c.betweenness));
    }

    #[test]
    fn test_dense_solver_is_bounded_on_shift_matrix() {
        let mut w = vec![vec![0.0; 48]; 48];
        for i in 0..47 {
            w[i][i + 1] = 1.0;
        }
        if let Some(x) = dense_eigenvector(&w) {
            assert!(x.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_non_convergence_falls_back_to_dense_solver() {
        let m = matrix(&[
            &[0.0, 1.0, 0.5],
            &[0.0, 0.0, 1.0],
            &[1.0, 0.0, 0.0],
        ]);
        let g = TransitionGraph::full(&m);
        // One iteration cannot converge, so the cyclic graph goes through the dense path
        let fallback = eigenvector_on(&g, 1);
        let converged = eigenvector_centrality(&m);
        assert_eq!(fallback.len(), 3);
        assert!(all_in_unit_range(&fallback));
        for (k, v) in &converged {
            assert!((fallback[k] - v).abs() < 1e-4, "node {}: {} vs {}", k, fallback[k], v);
        }
    }

    #[test]
    fn test_degree_normalized_by_window_size() {
        // Isolated notes still count toward n
        let mut rows = vec![vec![0.0; 48]; 48];
        rows[0][2] = 1.0;
        rows[2][0] = 1.0;
        let d = degree_centrality(&TransitionMatrix::from_rows(&rows).unwrap());
        assert_eq!(d.len(), 48);
        assert!((d[&0] - 1.0 / 47.0).abs() < 1e-12);
        assert_eq!(d[&5], 0.0);
    }

    #[test]
    fn test_eigenvector_favours_popular_target() {
        // Everything flows into node 3
        let m = matrix(&[
            &[0.0, 0.0, 0.0, 1.0],
            &[0.0, 0.0, 0.0, 1.0],
            &[0.0, 0.0, 0.0, 1.0],
            &[0.5, 0.5, 0.0, 0.0],
        ]);
        let e = eigenvector_centrality(&m);
        assert!(e[&3] > e[&0]);
        assert!(e[&0] > e[&2]);
        assert!(all_in_unit_range(&e));
    }

    #[test]
    fn test_idempotent() {
        let m = cycle4();
        assert_eq!(Centralities::from_matrix(&m), Centralities::from_matrix(&m));
    }
}
