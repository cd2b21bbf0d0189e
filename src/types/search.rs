use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata attached to a passage by the vector store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PassageMetadata {
    pub source: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl PassageMetadata {
    pub fn new(source: impl Into<String>, location: Option<String>) -> Self {
        Self {
            source: source.into(),
            location,
            extra: BTreeMap::new(),
        }
    }
}

/// One hit returned by the vector store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passage {
    pub text: String,
    pub metadata: PassageMetadata,
}

impl Passage {
    pub fn new(text: impl Into<String>, metadata: PassageMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Vector,
    Graph,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Vector => write!(f, "vector"),
            Origin::Graph => write!(f, "graph"),
        }
    }
}

/// A passage tagged with how it was retrieved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedPassage {
    pub passage: Passage,
    pub origin: Origin,

    /// Entity whose lookup produced this passage (graph origin only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl RetrievedPassage {
    pub fn vector(passage: Passage) -> Self {
        Self {
            passage,
            origin: Origin::Vector,
            entity_id: None,
        }
    }

    pub fn graph(passage: Passage, entity_id: impl Into<String>) -> Self {
        Self {
            passage,
            origin: Origin::Graph,
            entity_id: Some(entity_id.into()),
        }
    }
}

/// Pipeline states a query moves through, in order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum QueryStage {
    Init,
    VectorSearchDone,
    EntitiesExtracted,
    GraphExpanded,
    PathsFound,
    ContextBuilt,
    Complete,
}

/// Why the graph did or did not contribute to a query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GraphSignal {
    #[default]
    Disabled,
    EmptyGraph,
    NoSeeds,
    Expanded,
    Errored,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueryDiagnostics {
    /// Recovered per-stage failures keyed by stage (`vectorError`, `graphError`, ...).
    pub errors: BTreeMap<String, String>,
    pub graph_signal: GraphSignal,
    pub graph_nodes: usize,
    pub vector_count: usize,
    pub graph_count: usize,
    pub duplicates_dropped: usize,
    pub stages: Vec<QueryStage>,
}

impl QueryDiagnostics {
    pub fn error(&self, key: &str) -> Option<&str> {
        self.errors.get(key).map(String::as_str)
    }

    pub fn record(&mut self, key: &str, message: impl Into<String>) {
        let message = message.into();
        self.errors
            .entry(key.to_string())
            .and_modify(|existing| {
                existing.push_str("; ");
                existing.push_str(&message);
            })
            .or_insert(message);
    }
}

/// Everything produced for one query. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query: String,
    pub vector_passages: Vec<RetrievedPassage>,
    pub graph_passages: Vec<RetrievedPassage>,
    pub seed_entities: Vec<String>,
    pub related_entities: Vec<String>,
    pub paths: Vec<Vec<String>>,
    pub context: String,
    pub diagnostics: QueryDiagnostics,
}

impl QueryOutcome {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            vector_passages: Vec::new(),
            graph_passages: Vec::new(),
            seed_entities: Vec::new(),
            related_entities: Vec::new(),
            paths: Vec::new(),
            context: String::new(),
            diagnostics: QueryDiagnostics::default(),
        }
    }

    /// Vector passages followed by graph passages; the citation order.
    pub fn merged(&self) -> impl Iterator<Item = &RetrievedPassage> {
        self.vector_passages.iter().chain(self.graph_passages.iter())
    }
}
