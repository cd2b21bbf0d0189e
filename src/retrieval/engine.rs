use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::{BuildOptions, RetrievalConfig};
use crate::extract::{ConceptDictionary, EntityExtractor};
use crate::graph::{
    BuildReport, GraphBuilder, GraphHandle, GraphStatistics, KnowledgeGraph, MAX_TRAVERSAL_DEPTH,
};
use crate::storage::{GraphStore, SnapshotMeta};
use crate::types::{
    AppError, GraphSignal, Passage, QueryOutcome, QueryStage, RelationKind, Result,
    RetrievedPassage,
};

use super::cache::CachedEmbedder;
use super::context::render_context;
use super::traits::{Embedder, VectorStore};

pub const VECTOR_ERROR: &str = "vectorError";
pub const ENTITY_ERROR: &str = "entityError";
pub const GRAPH_ERROR: &str = "graphError";
pub const LOOKUP_ERROR: &str = "lookupError";

const QUERY_SOURCE_ID: &str = "query";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryRequest {
    pub text: String,
    pub top_k_vector: usize,
    /// Clamped to `1..=MAX_TRAVERSAL_DEPTH`.
    pub max_graph_depth: usize,
    pub enable_graph: bool,
    pub relation_kind: Option<RelationKind>,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self::from_config(text, &RetrievalConfig::default())
    }

    pub fn from_config(text: impl Into<String>, config: &RetrievalConfig) -> Self {
        Self {
            text: text.into(),
            top_k_vector: config.top_k_vector,
            max_graph_depth: config.max_graph_depth,
            enable_graph: true,
            relation_kind: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k_vector = top_k;
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.max_graph_depth = depth;
        self
    }

    pub fn with_graph(mut self, enable: bool) -> Self {
        self.enable_graph = enable;
        self
    }

    pub fn with_relation_kind(mut self, kind: RelationKind) -> Self {
        self.relation_kind = Some(kind);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(AppError::Input("query text is empty".to_string()));
        }
        if self.top_k_vector == 0 {
            return Err(AppError::Input(
                "top_k_vector must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatisticsReport {
    NoGraphLoaded,
    Ready(GraphStatistics),
}

/// Graph work decided before any upstream call is made.
struct GraphPlan {
    lookups: Vec<(String, String)>,
}

/// Graph-enhanced retrieval over an external vector store.
pub struct GraphRag {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<CachedEmbedder>,
    graph: Arc<GraphHandle>,
    extractor: EntityExtractor,
    store: Option<Arc<dyn GraphStore>>,
    load_error: RwLock<Option<String>>,
    config: RetrievalConfig,
}

impl GraphRag {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            vector_store,
            embedder: Arc::new(CachedEmbedder::new(embedder, config.embedding_cache_size)),
            graph: Arc::new(GraphHandle::default()),
            extractor: EntityExtractor::new(),
            store: None,
            load_error: RwLock::new(None),
            config,
        }
    }

    pub fn with_concepts(mut self, concepts: ConceptDictionary) -> Self {
        self.extractor = EntityExtractor::with_concepts(concepts);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn GraphStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share a handle with another owner, e.g. a background rebuild task.
    pub fn with_graph_handle(mut self, handle: Arc<GraphHandle>) -> Self {
        self.graph = handle;
        self
    }

    pub fn graph_handle(&self) -> &Arc<GraphHandle> {
        &self.graph
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn embedder(&self) -> &CachedEmbedder {
        &self.embedder
    }

    pub async fn graph(&self) -> Arc<KnowledgeGraph> {
        self.graph.current().await
    }

    pub async fn publish(&self, graph: KnowledgeGraph) -> u64 {
        *self.load_error.write().await = None;
        self.graph.publish(graph).await
    }

    fn require_store(&self) -> Result<&Arc<dyn GraphStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| AppError::Input("no graph store configured".to_string()))
    }

    /// Load the persisted snapshot and publish it.
    ///
    /// On failure the current snapshot keeps serving. Queries report the
    /// failure under `graphError` only while no non-empty graph is published.
    pub async fn load_graph(&self) -> Result<()> {
        let store = self.require_store()?.clone();
        match store.load().await {
            Ok(graph) => {
                self.publish(graph).await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(store = store.name(), error = %e, "Could not load graph, keeping current snapshot");
                *self.load_error.write().await = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn save_graph(&self) -> Result<SnapshotMeta> {
        let store = self.require_store()?.clone();
        let graph = self.graph.current().await;
        store.save(&graph).await
    }

    /// Enumerate the vector store, build a fresh graph in batches and publish it.
    pub async fn build_graph_from_store(
        &self,
        limit: Option<usize>,
        options: BuildOptions,
    ) -> Result<BuildReport> {
        let documents = self.vector_store.enumerate(limit).await?;
        if documents.is_empty() {
            tracing::warn!("No documents found in vector store");
        }

        let concepts = self.extractor.concepts().clone();
        let (graph, report) = tokio::task::spawn_blocking(move || {
            let batch_size = options.batch_size.max(1);
            let mut builder = GraphBuilder::with_concepts(options, concepts);
            for batch in documents.chunks(batch_size) {
                builder.ingest_batch(batch);
            }
            builder.finish()
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

        self.publish(graph).await;
        Ok(report)
    }

    pub async fn graph_statistics(&self) -> StatisticsReport {
        let graph = self.graph.current().await;
        if graph.is_empty() {
            return StatisticsReport::NoGraphLoaded;
        }
        StatisticsReport::Ready(graph.statistics())
    }

    /// Answer `request` from vector search fused with graph expansion.
    ///
    /// Only an invalid request is an error. Every stage failure after that is
    /// recorded in `diagnostics.errors` and the pipeline carries on.
    pub async fn query(&self, request: QueryRequest) -> Result<QueryOutcome> {
        request.validate()?;
        let text = request.text.trim();
        let depth = request.max_graph_depth.clamp(1, MAX_TRAVERSAL_DEPTH);

        let graph = self.graph.current().await;
        let mut outcome = QueryOutcome::new(request.text.clone());
        outcome.diagnostics.stages.push(QueryStage::Init);
        outcome.diagnostics.graph_nodes = graph.node_count();

        let vector_search = self.vector_search(text, request.top_k_vector);
        let plan = self.plan_graph(&graph, &request, text, depth, &mut outcome).await;
        let lookups = plan
            .lookups
            .iter()
            .map(|(id, name)| self.entity_lookup(id, name));

        let (vector_result, lookup_results) = futures::join!(vector_search, join_all(lookups));

        match vector_result {
            Ok(passages) => {
                outcome.vector_passages = passages.into_iter().map(RetrievedPassage::vector).collect();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Vector search failed");
                outcome.diagnostics.record(VECTOR_ERROR, e.to_string());
            }
        }
        outcome.diagnostics.stages.extend([
            QueryStage::VectorSearchDone,
            QueryStage::EntitiesExtracted,
            QueryStage::GraphExpanded,
            QueryStage::PathsFound,
        ]);

        let mut seen: HashSet<(String, Option<String>, String)> = outcome
            .vector_passages
            .iter()
            .map(|p| passage_key(&p.passage))
            .collect();
        let mut failed_lookups = 0;

        for ((entity_id, _), result) in plan.lookups.iter().zip(lookup_results) {
            match result {
                Ok(passages) => {
                    for passage in passages {
                        if seen.insert(passage_key(&passage)) {
                            outcome
                                .graph_passages
                                .push(RetrievedPassage::graph(passage, entity_id.as_str()));
                        } else {
                            outcome.diagnostics.duplicates_dropped += 1;
                        }
                    }
                }
                Err(e) => {
                    failed_lookups += 1;
                    tracing::warn!(entity = %entity_id, error = %e, "Entity lookup failed");
                    outcome
                        .diagnostics
                        .record(LOOKUP_ERROR, format!("{}: {}", entity_id, e));
                }
            }
        }
        if failed_lookups > 0 && failed_lookups == plan.lookups.len() {
            outcome.diagnostics.graph_signal = GraphSignal::Errored;
        }

        outcome.context = render_context(outcome.merged());
        outcome.diagnostics.vector_count = outcome.vector_passages.len();
        outcome.diagnostics.graph_count = outcome.graph_passages.len();
        outcome
            .diagnostics
            .stages
            .extend([QueryStage::ContextBuilt, QueryStage::Complete]);

        tracing::info!(
            vector = outcome.diagnostics.vector_count,
            graph = outcome.diagnostics.graph_count,
            seeds = outcome.seed_entities.len(),
            signal = ?outcome.diagnostics.graph_signal,
            "Query complete"
        );
        Ok(outcome)
    }

    /// Seed extraction, expansion and path discovery over the snapshot.
    async fn plan_graph(
        &self,
        graph: &KnowledgeGraph,
        request: &QueryRequest,
        text: &str,
        depth: usize,
        outcome: &mut QueryOutcome,
    ) -> GraphPlan {
        let mut plan = GraphPlan {
            lookups: Vec::new(),
        };
        let diagnostics = &mut outcome.diagnostics;

        if !request.enable_graph {
            diagnostics.graph_signal = GraphSignal::Disabled;
            return plan;
        }

        if graph.is_empty() {
            if let Some(error) = self.load_error.read().await.as_ref() {
                diagnostics.record(GRAPH_ERROR, format!("graph unavailable: {}", error));
                diagnostics.graph_signal = GraphSignal::Errored;
            } else {
                diagnostics.graph_signal = GraphSignal::EmptyGraph;
            }
            return plan;
        }

        let seeds: Vec<String> = match self.extractor.scan(text, QUERY_SOURCE_ID, None) {
            Ok(entities) => entities.into_iter().map(|e| e.id).collect(),
            Err(e) => {
                diagnostics.record(ENTITY_ERROR, e.to_string());
                diagnostics.graph_signal = GraphSignal::Errored;
                return plan;
            }
        };

        let related = graph.expand(&seeds, request.relation_kind, depth);
        outcome.paths = connecting_paths(graph, &seeds, request.relation_kind, self.config.max_paths);

        diagnostics.graph_signal = if related.is_empty() {
            GraphSignal::NoSeeds
        } else {
            GraphSignal::Expanded
        };

        plan.lookups = related
            .iter()
            .take(self.config.max_graph_entities)
            .filter_map(|id| graph.node(id).map(|node| (id.clone(), node.name.clone())))
            .collect();

        tracing::debug!(
            seeds = seeds.len(),
            related = related.len(),
            paths = outcome.paths.len(),
            "Graph stages done"
        );
        outcome.seed_entities = seeds;
        outcome.related_entities = related;
        plan
    }

    async fn vector_search(&self, text: &str, k: usize) -> Result<Vec<Passage>> {
        let vector = self.embedder.embed(text).await?;
        self.vector_store.search(&vector, k).await
    }

    /// Passages for one related entity, keeping only those that mention it.
    async fn entity_lookup(&self, entity_id: &str, name: &str) -> Result<Vec<Passage>> {
        let vector = self.embedder.embed(name).await?;
        let hits = self
            .vector_store
            .search(&vector, self.config.entity_lookup_k)
            .await?;

        let id_lower = entity_id.to_lowercase();
        let name_lower = name.to_lowercase();
        Ok(hits
            .into_iter()
            .filter(|p| {
                let text = p.text.to_lowercase();
                text.contains(&id_lower) || text.contains(&name_lower)
            })
            .collect())
    }
}

fn passage_key(passage: &Passage) -> (String, Option<String>, String) {
    (
        passage.metadata.source.clone(),
        passage.metadata.location.clone(),
        passage.text.clone(),
    )
}

/// Shortest paths between each unordered pair of seeds, at most `max_paths`.
/// A pair with no path in either direction contributes nothing.
fn connecting_paths(
    graph: &KnowledgeGraph,
    seeds: &[String],
    kind: Option<RelationKind>,
    max_paths: usize,
) -> Vec<Vec<String>> {
    let mut paths = Vec::new();
    for (i, source) in seeds.iter().enumerate() {
        for target in &seeds[i + 1..] {
            if paths.len() >= max_paths {
                return paths;
            }
            if let Some(path) = graph
                .shortest_path(source, target, kind)
                .or_else(|| graph.shortest_path(target, source, kind))
            {
                paths.push(path);
            }
        }
    }
    paths
}
