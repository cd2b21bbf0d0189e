use std::collections::BTreeMap;

use petgraph::algo::connected_components;
use serde::{Deserialize, Serialize};

use crate::extract::{EntityFrequency, RegistryStatistics};
use crate::types::{EntityKind, RelationKind};

use super::centrality::CentralityMetric;
use super::knowledge_graph::KnowledgeGraph;

pub const TOP_PER_KIND: usize = 10;
pub const TOP_CENTRAL: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CentralEntity {
    pub id: String,
    pub name: String,
    pub score: f64,
}

/// Structured report for external dashboards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphStatistics {
    pub num_nodes: usize,
    pub num_edges: usize,
    /// Edges over possible edges of a simple directed graph, n(n-1).
    pub density: f64,
    /// Mean of in-degree + out-degree, i.e. 2E / N.
    pub avg_degree: f64,
    pub num_connected_components: usize,
    pub nodes_by_kind: BTreeMap<EntityKind, usize>,
    pub edges_by_kind: BTreeMap<RelationKind, usize>,
    /// Most frequent nodes of every kind present.
    pub top_by_kind: BTreeMap<EntityKind, Vec<EntityFrequency>>,
    pub entity_statistics: RegistryStatistics,
    pub top_central_entities: Vec<CentralEntity>,
}

impl KnowledgeGraph {
    pub fn statistics(&self) -> GraphStatistics {
        let n = self.node_count();
        let e = self.edge_count();

        let density = if n > 1 {
            e as f64 / (n * (n - 1)) as f64
        } else {
            0.0
        };
        let avg_degree = if n > 0 { 2.0 * e as f64 / n as f64 } else { 0.0 };

        let mut nodes_by_kind: BTreeMap<EntityKind, usize> = BTreeMap::new();
        let mut grouped: BTreeMap<EntityKind, Vec<EntityFrequency>> = BTreeMap::new();
        for node in self.nodes() {
            *nodes_by_kind.entry(node.kind).or_insert(0) += 1;
            grouped.entry(node.kind).or_default().push(EntityFrequency {
                id: node.id.clone(),
                frequency: node.frequency,
            });
        }
        let top_by_kind = grouped
            .into_iter()
            .map(|(kind, mut list)| {
                list.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.id.cmp(&b.id)));
                list.truncate(TOP_PER_KIND);
                (kind, list)
            })
            .collect();

        let mut edges_by_kind: BTreeMap<RelationKind, usize> = BTreeMap::new();
        for edge in self.inner().edge_weights() {
            *edges_by_kind.entry(edge.kind).or_insert(0) += 1;
        }

        let top_central_entities = self
            .central_entities(CentralityMetric::PageRank, TOP_CENTRAL)
            .into_iter()
            .map(|(id, score)| CentralEntity {
                name: self.node(&id).map(|n| n.name.clone()).unwrap_or_default(),
                id,
                score,
            })
            .collect();

        GraphStatistics {
            num_nodes: n,
            num_edges: e,
            density,
            avg_degree,
            num_connected_components: connected_components(self.inner()),
            nodes_by_kind,
            edges_by_kind,
            top_by_kind,
            entity_statistics: self.registry().statistics(),
            top_central_entities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildOptions;
    use crate::graph::build_from_corpus;
    use crate::types::CorpusDocument;

    #[test]
    fn test_empty_graph_statistics() {
        let stats = KnowledgeGraph::new().statistics();
        assert_eq!(stats.num_nodes, 0);
        assert_eq!(stats.density, 0.0);
        assert_eq!(stats.avg_degree, 0.0);
        assert_eq!(stats.num_connected_components, 0);
        assert!(stats.top_central_entities.is_empty());
    }

    #[test]
    fn test_corpus_statistics() {
        let docs = vec![
            CorpusDocument::new("d1", "AC-2 should enforce MFA"),
            CorpusDocument::new("d2", "AU-6 reviews SP 800-92"),
        ];
        let (graph, _) = build_from_corpus(&docs, BuildOptions::default()).unwrap();
        let stats = graph.statistics();

        // AC-2, mfa, AU-6, SP-800-92, FAMILY-AC, FAMILY-AU
        assert_eq!(stats.num_nodes, 6);
        // two co-occurrence pairs plus two hierarchy edges
        assert_eq!(stats.num_edges, 6);
        assert_eq!(stats.edges_by_kind[&RelationKind::CoOccurrence], 4);
        assert_eq!(stats.edges_by_kind[&RelationKind::Hierarchy], 2);
        assert_eq!(stats.num_connected_components, 2);
        assert!((stats.density - 6.0 / 30.0).abs() < 1e-12);
        assert!((stats.avg_degree - 2.0).abs() < 1e-12);
        assert_eq!(stats.nodes_by_kind[&EntityKind::SynthesizedFamily], 2);
        assert_eq!(stats.top_by_kind[&EntityKind::CodeIdentifier].len(), 2);
        assert_eq!(stats.entity_statistics.total_entities, 4);
        assert_eq!(stats.top_central_entities.len(), 6);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["num_nodes"], 6);
    }
}
