//! Knowledge graph construction and analysis
//!
//! - `knowledge_graph`: petgraph-backed directed multigraph of entities
//! - `builder`: corpus -> graph (co-occurrence and family hierarchy edges)
//! - `traversal`: BFS neighbours, shortest path, seed expansion
//! - `centrality`: degree, betweenness, closeness, PageRank
//! - `stats`: structured statistics report
//! - `handle`: atomic publish of immutable snapshots

pub mod builder;
pub mod centrality;
pub mod handle;
pub mod knowledge_graph;
pub mod stats;
pub mod traversal;

pub use builder::{build_from_corpus, build_with_concepts, BuildReport, GraphBuilder};
pub use centrality::CentralityMetric;
pub use handle::GraphHandle;
pub use knowledge_graph::{GraphEdge, GraphNode, KnowledgeGraph};
pub use stats::{CentralEntity, GraphStatistics};
pub use traversal::MAX_TRAVERSAL_DEPTH;
