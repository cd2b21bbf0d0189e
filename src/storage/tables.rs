//! Three-table snapshot schema shared by every backend.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::EntityRegistry;
use crate::graph::{GraphNode, KnowledgeGraph};
use crate::types::{AppError, Entity, Relation, Result};

pub const SCHEMA_VERSION: u32 = 1;

/// Row-oriented view of a graph. Node and edge rows keep graph insertion
/// order; registry rows are sorted by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphTables {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Relation>,
    pub registry: Vec<Entity>,
}

/// Metadata stored alongside a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotMeta {
    pub schema_version: u32,
    pub built_at: DateTime<Utc>,
    /// blake3 of the canonical JSON encoding of the three tables.
    pub fingerprint: String,
    pub nodes: usize,
    pub edges: usize,
    pub entities: usize,
}

impl GraphTables {
    pub fn from_graph(graph: &KnowledgeGraph) -> Self {
        Self {
            nodes: graph.nodes().cloned().collect(),
            edges: graph.relations(),
            registry: graph.registry().entities().into_iter().cloned().collect(),
        }
    }

    /// Rebuild the graph, rejecting duplicate node ids, duplicate
    /// `(source, target, kind)` edges and edges with unknown endpoints.
    pub fn into_graph(self) -> Result<KnowledgeGraph> {
        let mut seen_edges = HashSet::new();
        for edge in &self.edges {
            if !seen_edges.insert((edge.source.as_str(), edge.target.as_str(), edge.kind)) {
                return Err(AppError::GraphIntegrity(format!(
                    "duplicate {} edge {} -> {}",
                    edge.kind, edge.source, edge.target
                )));
            }
        }

        let mut graph = KnowledgeGraph::new();
        for node in self.nodes {
            let id = node.id.clone();
            if graph.contains(&id) {
                return Err(AppError::GraphIntegrity(format!("duplicate node '{}'", id)));
            }
            graph.add_node(node);
        }

        for edge in self.edges {
            graph.add_relation(edge)?;
        }

        graph.set_registry(EntityRegistry::from_iter(self.registry));
        Ok(graph)
    }

    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    pub fn meta(&self) -> Result<SnapshotMeta> {
        Ok(SnapshotMeta {
            schema_version: SCHEMA_VERSION,
            built_at: Utc::now(),
            fingerprint: self.fingerprint()?,
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            entities: self.registry.len(),
        })
    }

    /// Check a loaded snapshot against its stored metadata.
    pub fn verify(&self, meta: &SnapshotMeta) -> Result<()> {
        if meta.schema_version != SCHEMA_VERSION {
            return Err(AppError::Storage(format!(
                "unsupported schema version {} (expected {})",
                meta.schema_version, SCHEMA_VERSION
            )));
        }
        let actual = self.fingerprint()?;
        if actual != meta.fingerprint {
            return Err(AppError::GraphIntegrity(format!(
                "fingerprint mismatch: stored {}, computed {}",
                meta.fingerprint, actual
            )));
        }
        Ok(())
    }
}
