use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::extract::EntityRegistry;
use crate::graph::{GraphNode, KnowledgeGraph};
use crate::retrieval::{Embedder, VectorStore};
use crate::types::{
    AppError, CorpusDocument, Entity, EntityKind, Passage, PassageMetadata, Relation,
    RelationKind, Result,
};

/// Deterministic bag-of-words embedder: each token is hashed with blake3 into
/// a bucket, and the counts are L2-normalised. Texts sharing tokens score
/// above zero under cosine similarity.
pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();
        let tokens = lower
            .split(|c: char| !(c.is_alphanumeric() || c == '-'))
            .filter(|t| !t.is_empty());
        for token in tokens {
            let hash = blake3::hash(token.as_bytes());
            let bytes = hash.as_bytes();
            let bucket = u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]) as usize
                % self.dimensions;
            vec[bucket] += 1.0;
        }
        let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn model_id(&self) -> &str {
        "mock"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector(text))
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_id(&self) -> &str {
        "failing"
    }

    fn dimensions(&self) -> usize {
        0
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(AppError::Upstream("embedding service unavailable".to_string()))
    }
}

/// In-memory vector store ranking by dot product against [`MockEmbedder`]
/// vectors of its passages. Ties keep insertion order.
pub struct MockVectorStore {
    entries: Vec<(Passage, Vec<f32>)>,
    fail_on: Vec<Vec<f32>>,
    searches: AtomicUsize,
}

pub const MOCK_DIMENSIONS: usize = 64;

impl MockVectorStore {
    pub fn new(passages: Vec<Passage>) -> Self {
        let embedder = MockEmbedder::new(MOCK_DIMENSIONS);
        Self {
            entries: passages
                .into_iter()
                .map(|p| {
                    let vec = embedder.vector(&p.text);
                    (p, vec)
                })
                .collect(),
            fail_on: Vec::new(),
            searches: AtomicUsize::new(0),
        }
    }

    /// Fail any search whose query vector equals the embedding of `text`.
    pub fn fail_on_text(mut self, embedder: &MockEmbedder, text: &str) -> Self {
        self.fail_on.push(embedder.vector(text));
        self
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for MockVectorStore {
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<Passage>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.iter().any(|v| v.as_slice() == query) {
            return Err(AppError::Upstream("vector store unavailable".to_string()));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (_, vec))| (i, vec.iter().zip(query).map(|(a, b)| a * b).sum()))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, _)| self.entries[i].0.clone())
            .collect())
    }

    async fn enumerate(&self, limit: Option<usize>) -> Result<Vec<CorpusDocument>> {
        Ok(self
            .entries
            .iter()
            .enumerate()
            .take(limit.unwrap_or(usize::MAX))
            .map(|(i, (p, _))| CorpusDocument::new(format!("doc-{}", i), p.text.as_str()))
            .collect())
    }
}

pub struct FailingVectorStore;

#[async_trait]
impl VectorStore for FailingVectorStore {
    async fn search(&self, _query: &[f32], _k: usize) -> Result<Vec<Passage>> {
        Err(AppError::Upstream("vector store unavailable".to_string()))
    }

    async fn enumerate(&self, _limit: Option<usize>) -> Result<Vec<CorpusDocument>> {
        Err(AppError::Upstream("vector store unavailable".to_string()))
    }
}

pub fn passage(text: &str, source: &str, location: &str) -> Passage {
    Passage::new(text, PassageMetadata::new(source, Some(location.to_string())))
}

/// Multigraph with co-occurrence, hierarchy and semantic edges, nested
/// properties and a populated registry.
pub fn sample_multigraph() -> KnowledgeGraph {
    let ac2 = Entity::new("AC-2", EntityKind::CodeIdentifier, "Control AC-2")
        .with_frequency(3)
        .with_source("d1")
        .with_source("d2")
        .with_property("family", "AC")
        .with_property("number", "2");
    let mfa = Entity::new("mfa", EntityKind::Concept, "Mfa")
        .with_aliases(["mfa", "2fa", "two-factor"])
        .with_frequency(2)
        .with_source("d2")
        .with_property("matched_keywords", serde_json::json!(["mfa"]));
    let sp = Entity::new("SP-800-53", EntityKind::Publication, "SP 800-53")
        .with_frequency(1)
        .with_source("d1")
        .with_property("publication_number", "800-53");
    let registry: EntityRegistry = vec![ac2.clone(), mfa.clone(), sp.clone()]
        .into_iter()
        .collect();

    let mut graph = KnowledgeGraph::with_registry(registry);
    for entity in [&ac2, &mfa, &sp] {
        graph.add_node(GraphNode::from(entity));
    }
    let mut family = GraphNode::new("FAMILY-AC", EntityKind::SynthesizedFamily, "AC - Control Family");
    family.frequency = 1;
    family
        .properties
        .insert("family".to_string(), serde_json::json!("AC"));
    graph.add_node(family);

    let edges = [
        Relation::new("AC-2", "mfa", RelationKind::CoOccurrence)
            .with_weight(2.0)
            .with_property("co_occurrence_count", 2),
        Relation::new("mfa", "AC-2", RelationKind::CoOccurrence)
            .with_weight(2.0)
            .with_property("co_occurrence_count", 2),
        Relation::new("FAMILY-AC", "AC-2", RelationKind::Hierarchy)
            .with_property("hierarchy_level", "family->member"),
        Relation::new("AC-2", "SP-800-53", RelationKind::Semantic)
            .with_weight(0.75)
            .with_property(
                "evidence",
                serde_json::json!({"pages": [12, 13], "section": {"title": "Account Management", "draft": false}}),
            ),
        Relation::new("AC-2", "mfa", RelationKind::Semantic).with_weight(0.5),
    ];
    for edge in edges {
        graph.add_relation(edge).unwrap();
    }
    graph
}

pub fn assert_same_graph(expected: &KnowledgeGraph, actual: &KnowledgeGraph) {
    let expected_nodes: Vec<&GraphNode> = expected.nodes().collect();
    let actual_nodes: Vec<&GraphNode> = actual.nodes().collect();
    assert_eq!(expected_nodes, actual_nodes);
    assert_eq!(expected.relations(), actual.relations());
    assert_eq!(expected.registry(), actual.registry());
}
