//! Centrality scores over the entity graph.
//!
//! Degree and PageRank are cheap and used for default reporting. Betweenness
//! and closeness run one BFS per node (O(V·E)) and are only computed when a
//! caller asks for them by name; avoid them on large graphs.

use std::collections::VecDeque;

use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::types::{AppError, Result};

use super::knowledge_graph::KnowledgeGraph;

pub const PAGERANK_DAMPING: f64 = 0.85;
pub const PAGERANK_TOLERANCE: f64 = 1e-6;
pub const PAGERANK_MAX_ITER: usize = 100;

/// Node count above which the O(V·E) metrics log a warning.
pub const EXPENSIVE_METRIC_WARN_NODES: usize = 10_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CentralityMetric {
    Degree,
    Betweenness,
    Closeness,
    #[default]
    PageRank,
}

impl CentralityMetric {
    pub fn is_expensive(&self) -> bool {
        matches!(self, Self::Betweenness | Self::Closeness)
    }
}

impl std::str::FromStr for CentralityMetric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "degree" => Ok(Self::Degree),
            "betweenness" => Ok(Self::Betweenness),
            "closeness" => Ok(Self::Closeness),
            "pagerank" | "page_rank" | "page-rank" => Ok(Self::PageRank),
            _ => Err(AppError::Input(format!("Unknown centrality metric: {}", s))),
        }
    }
}

impl std::fmt::Display for CentralityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Degree => write!(f, "degree"),
            Self::Betweenness => write!(f, "betweenness"),
            Self::Closeness => write!(f, "closeness"),
            Self::PageRank => write!(f, "pagerank"),
        }
    }
}

impl KnowledgeGraph {
    /// Top `top_k` entities by `metric`, score descending, ties by id.
    pub fn central_entities(&self, metric: CentralityMetric, top_k: usize) -> Vec<(String, f64)> {
        if metric.is_expensive() && self.node_count() > EXPENSIVE_METRIC_WARN_NODES {
            tracing::warn!(
                %metric,
                nodes = self.node_count(),
                "Computing O(V*E) centrality on a large graph"
            );
        }

        let scores = match metric {
            CentralityMetric::Degree => degree_centrality(self),
            CentralityMetric::Betweenness => betweenness_centrality(self),
            CentralityMetric::Closeness => closeness_centrality(self),
            CentralityMetric::PageRank => page_rank(
                self,
                PAGERANK_DAMPING,
                PAGERANK_TOLERANCE,
                PAGERANK_MAX_ITER,
            ),
        };

        let mut ranked: Vec<(String, f64)> = self
            .inner()
            .node_indices()
            .map(|idx| (self.node_id(idx).to_string(), scores[idx.index()]))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(top_k);
        ranked
    }
}

/// Distinct successor lists; parallel edges of different kinds collapse.
fn successors(graph: &KnowledgeGraph) -> Vec<Vec<usize>> {
    let inner = graph.inner();
    let mut adjacency = vec![Vec::new(); inner.node_count()];
    for edge in inner.edge_references() {
        adjacency[edge.source().index()].push(edge.target().index());
    }
    for list in &mut adjacency {
        list.sort_unstable();
        list.dedup();
    }
    adjacency
}

fn predecessors(graph: &KnowledgeGraph) -> Vec<Vec<usize>> {
    let inner = graph.inner();
    let mut adjacency = vec![Vec::new(); inner.node_count()];
    for edge in inner.edge_references() {
        adjacency[edge.target().index()].push(edge.source().index());
    }
    for list in &mut adjacency {
        list.sort_unstable();
        list.dedup();
    }
    adjacency
}

/// (in-degree + out-degree) / (n - 1), parallel edges counted.
pub fn degree_centrality(graph: &KnowledgeGraph) -> Vec<f64> {
    let inner = graph.inner();
    let n = inner.node_count();
    if n <= 1 {
        return vec![1.0; n];
    }

    let mut degree = vec![0usize; n];
    for edge in inner.edge_references() {
        degree[edge.source().index()] += 1;
        degree[edge.target().index()] += 1;
    }
    let scale = 1.0 / (n - 1) as f64;
    degree.into_iter().map(|d| d as f64 * scale).collect()
}

/// Brandes betweenness on the directed graph, normalised by (n-1)(n-2).
pub fn betweenness_centrality(graph: &KnowledgeGraph) -> Vec<f64> {
    let adjacency = successors(graph);
    let n = adjacency.len();
    let mut betweenness = vec![0.0; n];

    for s in 0..n {
        let mut stack: Vec<usize> = Vec::with_capacity(n);
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0f64; n];
        let mut dist = vec![-1i64; n];
        sigma[s] = 1.0;
        dist[s] = 0;

        let mut queue = VecDeque::new();
        queue.push_back(s);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &w in &adjacency[v] {
                if dist[w] < 0 {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
            }
        }

        let mut delta = vec![0.0f64; n];
        while let Some(w) = stack.pop() {
            for &v in &preds[w] {
                delta[v] += (sigma[v] / sigma[w]) * (1.0 + delta[w]);
            }
            if w != s {
                betweenness[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        for b in &mut betweenness {
            *b *= scale;
        }
    }
    betweenness
}

/// Closeness over incoming distances with the Wasserman-Faust correction
/// for graphs that are not strongly connected.
pub fn closeness_centrality(graph: &KnowledgeGraph) -> Vec<f64> {
    let reverse = predecessors(graph);
    let n = reverse.len();
    let mut closeness = vec![0.0; n];
    if n <= 1 {
        return closeness;
    }

    for (u, score) in closeness.iter_mut().enumerate() {
        let mut dist = vec![usize::MAX; n];
        dist[u] = 0;
        let mut queue = VecDeque::new();
        queue.push_back(u);
        let mut total = 0usize;
        let mut reached = 0usize;

        while let Some(v) = queue.pop_front() {
            for &w in &reverse[v] {
                if dist[w] == usize::MAX {
                    dist[w] = dist[v] + 1;
                    total += dist[w];
                    reached += 1;
                    queue.push_back(w);
                }
            }
        }

        if total > 0 {
            let r = reached as f64;
            *score = (r / total as f64) * (r / (n - 1) as f64);
        }
    }
    closeness
}

/// Weighted PageRank by power iteration.
///
/// Transition probability along an edge is its weight over the source's total
/// outgoing weight. Mass at nodes with no (or zero-weight) outgoing edges is
/// spread uniformly.
pub fn page_rank(graph: &KnowledgeGraph, damping: f64, tolerance: f64, max_iter: usize) -> Vec<f64> {
    let inner = graph.inner();
    let n = inner.node_count();
    if n == 0 {
        return Vec::new();
    }

    let mut out_weight = vec![0.0f64; n];
    for edge in inner.edge_references() {
        out_weight[edge.source().index()] += edge.weight().weight;
    }

    let uniform = 1.0 / n as f64;
    let mut scores = vec![uniform; n];

    for _ in 0..max_iter {
        let mut next = vec![0.0f64; n];

        let dangling_sum: f64 = (0..n)
            .filter(|&i| out_weight[i] <= 0.0)
            .map(|i| scores[i])
            .sum();

        for edge in inner.edge_references() {
            let s = edge.source().index();
            if out_weight[s] > 0.0 {
                next[edge.target().index()] +=
                    damping * scores[s] * edge.weight().weight / out_weight[s];
            }
        }

        for value in next.iter_mut() {
            *value += damping * dangling_sum * uniform + (1.0 - damping) * uniform;
        }

        let diff: f64 = scores
            .iter()
            .zip(next.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();

        scores = next;

        if diff < n as f64 * tolerance {
            break;
        }
    }

    scores
}
