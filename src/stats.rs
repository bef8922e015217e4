//! Structural statistics computed directly from a transition matrix.
//!
//! Every function takes the full, unfiltered matrix: isolated notes are
//! counted. Edge presence is binary (`M[i][j] != 0`); weights play no role.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use crate::matrix::TransitionMatrix;

/// Total degree value → fraction of nodes with that degree.
pub type DegreeDistribution = BTreeMap<usize, f64>;

/// Note index → clustering coefficient.
pub type Clustering = BTreeMap<usize, f64>;

/// Summary of every statistic for one matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    pub degree_distribution: DegreeDistribution,
    pub clustering: Clustering,
    pub average_clustering: f64,
    pub diameter: usize,
    pub giant_component_size: usize,
}

impl GraphStats {
    pub fn compute(matrix: &TransitionMatrix) -> Self {
        let stats = Self {
            degree_distribution: degree_distribution(matrix),
            clustering: clustering_coefficients(matrix),
            average_clustering: average_clustering(matrix),
            diameter: diameter(matrix),
            giant_component_size: giant_component_size(matrix),
        };
        log::debug!(
            "Stats: avg clustering {:.4}, diameter {}, giant component {}",
            stats.average_clustering,
            stats.diameter,
            stats.giant_component_size
        );
        stats
    }
}

/// Distribution of total degree (out + in, self-loops counted twice).
pub fn degree_distribution(matrix: &TransitionMatrix) -> DegreeDistribution {
    let n = matrix.size();
    let a = matrix.binarized();

    let mut histogram: BTreeMap<usize, usize> = BTreeMap::new();
    for i in 0..n {
        let out_degree: u32 = a[i].iter().sum();
        let in_degree: u32 = a.iter().map(|row| row[i]).sum();
        *histogram.entry((out_degree + in_degree) as usize).or_insert(0) += 1;
    }

    histogram
        .into_iter()
        .map(|(degree, count)| (degree, count as f64 / n as f64))
        .collect()
}

/// Per-node clustering: closed 3-walks over `k(k - 1)` on the symmetrized graph.
///
/// `(U³)[i][i]` counts each incident triangle twice and the denominator is not
/// halved, so a node whose neighbours are fully connected scores 1.0.
pub fn clustering_coefficients(matrix: &TransitionMatrix) -> Clustering {
    let n = matrix.size();
    let u = matrix.undirected();
    let u2 = mat_mul(&u, &u);

    (0..n)
        .map(|i| {
            let k = u[i].iter().sum::<u32>() as f64;
            let closed_walks: u32 = (0..n).map(|j| u2[i][j] * u[j][i]).sum();
            let coefficient = if k >= 2.0 {
                closed_walks as f64 / (k * (k - 1.0))
            } else {
                0.0
            };
            (i, coefficient)
        })
        .collect()
}

pub fn average_clustering(matrix: &TransitionMatrix) -> f64 {
    let clustering = clustering_coefficients(matrix);
    if clustering.is_empty() {
        return 0.0;
    }
    clustering.values().sum::<f64>() / clustering.len() as f64
}

/// Longest shortest path (in edges) within the largest connected component
/// of the symmetrized graph.
pub fn diameter(matrix: &TransitionMatrix) -> usize {
    let u = matrix.undirected();
    if u.len() <= 1 || undirected_edge_count(&u) == 0 {
        return 0;
    }

    let adjacency = adjacency_lists(&u);
    let Some(giant) = components(&adjacency).into_iter().max_by(|a, b| {
        // Earlier component wins ties
        a.len().cmp(&b.len()).then(std::cmp::Ordering::Greater)
    }) else {
        return 0;
    };
    if giant.len() <= 1 {
        return 0;
    }

    giant
        .iter()
        .map(|&source| {
            bfs_distances(&adjacency, source)
                .into_iter()
                .flatten()
                .max()
                .unwrap_or(0)
        })
        .max()
        .unwrap_or(0)
}

/// Node count of the largest connected component of the symmetrized graph.
pub fn giant_component_size(matrix: &TransitionMatrix) -> usize {
    let u = matrix.undirected();
    if u.is_empty() {
        return 0;
    }
    if undirected_edge_count(&u) == 0 {
        return 1;
    }
    components(&adjacency_lists(&u))
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(0)
}

fn mat_mul(a: &[Vec<u32>], b: &[Vec<u32>]) -> Vec<Vec<u32>> {
    let n = a.len();
    let mut out = vec![vec![0u32; n]; n];
    for i in 0..n {
        for k in 0..n {
            if a[i][k] == 0 {
                continue;
            }
            for j in 0..n {
                out[i][j] += a[i][k] * b[k][j];
            }
        }
    }
    out
}

fn undirected_edge_count(u: &[Vec<u32>]) -> usize {
    u.iter().flatten().filter(|&&v| v != 0).count() / 2
}

fn adjacency_lists(u: &[Vec<u32>]) -> Vec<Vec<usize>> {
    u.iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .filter(|&(_, &v)| v != 0)
                .map(|(j, _)| j)
                .collect()
        })
        .collect()
}

/// Hop distance from `source` to every node; `None` if unreachable.
fn bfs_distances(adjacency: &[Vec<usize>], source: usize) -> Vec<Option<usize>> {
    let mut dist = vec![None; adjacency.len()];
    let mut queue = VecDeque::new();
    dist[source] = Some(0);
    queue.push_back(source);

    while let Some(v) = queue.pop_front() {
        let next = dist[v].unwrap_or(0) + 1;
        for &w in &adjacency[v] {
            if dist[w].is_none() {
                dist[w] = Some(next);
                queue.push_back(w);
            }
        }
    }
    dist
}

/// Connected components in order of their lowest node index.
fn components(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut seen = vec![false; adjacency.len()];
    let mut out = Vec::new();

    for start in 0..adjacency.len() {
        if seen[start] {
            continue;
        }
        let members: Vec<usize> = bfs_distances(adjacency, start)
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_some())
            .map(|(i, _)| i)
            .collect();
        for &m in &members {
            seen[m] = true;
        }
        out.push(members);
    }
    out
}
