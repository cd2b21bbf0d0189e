use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::BuildOptions;
use crate::extract::{ConceptDictionary, EntityExtractor};
use crate::types::{CorpusDocument, Entity, EntityKind, Relation, RelationKind, Result};

use super::knowledge_graph::{GraphNode, KnowledgeGraph};

pub const FAMILY_PREFIX: &str = "FAMILY-";

/// Counters describing one corpus build.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BuildReport {
    pub documents_seen: usize,
    pub documents_skipped: usize,
    pub entities: usize,
    pub nodes: usize,
    pub edges: usize,
    pub families: usize,
    pub edges_by_kind: BTreeMap<RelationKind, usize>,
}

/// Accumulates corpus batches, then materialises a [`KnowledgeGraph`].
///
/// Extraction inside a batch runs in parallel against an immutable extractor;
/// the registry merge and co-occurrence counting that follow are serial, so no
/// worker ever touches shared state.
pub struct GraphBuilder {
    options: BuildOptions,
    extractor: EntityExtractor,
    co_occurrence: BTreeMap<(String, String), u64>,
    documents_seen: usize,
    documents_skipped: usize,
}

impl GraphBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self::with_concepts(options, ConceptDictionary::default())
    }

    pub fn with_concepts(options: BuildOptions, concepts: ConceptDictionary) -> Self {
        Self {
            options,
            extractor: EntityExtractor::with_concepts(concepts),
            co_occurrence: BTreeMap::new(),
            documents_seen: 0,
            documents_skipped: 0,
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn extractor(&self) -> &EntityExtractor {
        &self.extractor
    }

    /// Extract one batch of documents and fold the results into the running state.
    pub fn ingest_batch(&mut self, documents: &[CorpusDocument]) {
        let extractor = &self.extractor;
        let scanned: Vec<(&CorpusDocument, Result<Vec<Entity>>)> = documents
            .par_iter()
            .map(|doc| {
                if doc.id.trim().is_empty() {
                    return (doc, Ok(Vec::new()));
                }
                (doc, extractor.scan(&doc.text, &doc.id, None))
            })
            .collect();

        for (doc, result) in scanned {
            self.documents_seen += 1;

            if doc.id.trim().is_empty() {
                tracing::warn!("Skipping corpus entry with empty id");
                self.documents_skipped += 1;
                continue;
            }

            let entities = match result {
                Ok(entities) => entities,
                Err(e) => {
                    tracing::warn!(doc = %doc.id, error = %e, "Skipping document");
                    self.documents_skipped += 1;
                    continue;
                }
            };

            if self.options.enable_cooccurrence {
                self.count_pairs(&entities);
            }

            for entity in entities {
                self.extractor.register(entity);
            }
        }

        tracing::debug!(
            batch = documents.len(),
            seen = self.documents_seen,
            entities = self.extractor.registry().len(),
            "Ingested batch"
        );
    }

    fn count_pairs(&mut self, entities: &[Entity]) {
        let ids: BTreeSet<&str> = entities.iter().map(|e| e.id.as_str()).collect();
        let ids: Vec<&str> = ids.into_iter().collect();

        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                *self
                    .co_occurrence
                    .entry((a.to_string(), b.to_string()))
                    .or_insert(0) += 1;
            }
        }
    }

    /// Materialise nodes and edges from everything ingested so far.
    pub fn finish(self) -> Result<(KnowledgeGraph, BuildReport)> {
        let registry = self.extractor.into_registry();
        let mut graph = KnowledgeGraph::new();
        let mut report = BuildReport {
            documents_seen: self.documents_seen,
            documents_skipped: self.documents_skipped,
            entities: registry.len(),
            ..BuildReport::default()
        };

        for entity in registry.entities() {
            graph.add_node(GraphNode::from(entity));
        }

        for ((a, b), count) in &self.co_occurrence {
            for (source, target) in [(a, b), (b, a)] {
                graph.add_relation(
                    Relation::new(source.as_str(), target.as_str(), RelationKind::CoOccurrence)
                        .with_weight(*count as f64)
                        .with_property("co_occurrence_count", *count),
                )?;
            }
        }

        if self.options.enable_hierarchy {
            report.families = add_family_hierarchy(&mut graph)?;
        }

        graph.set_registry(registry);

        report.nodes = graph.node_count();
        report.edges = graph.edge_count();
        for relation in graph.relations() {
            *report.edges_by_kind.entry(relation.kind).or_insert(0) += 1;
        }

        tracing::info!(
            nodes = report.nodes,
            edges = report.edges,
            families = report.families,
            skipped = report.documents_skipped,
            "Built knowledge graph"
        );
        Ok((graph, report))
    }
}

/// Group code identifiers by family and link a synthesised family node to each
/// member. Returns the number of family nodes created.
fn add_family_hierarchy(graph: &mut KnowledgeGraph) -> Result<usize> {
    let mut families: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for node in graph.nodes() {
        if node.kind != EntityKind::CodeIdentifier {
            continue;
        }
        let family = node
            .properties
            .get("family")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| node.id.split('-').next().map(str::to_string));
        if let Some(family) = family.filter(|f| !f.is_empty()) {
            families.entry(family).or_default().push(node.id.clone());
        }
    }

    let mut created = 0;
    for (family, members) in families {
        let family_id = format!("{}{}", FAMILY_PREFIX, family);
        if !graph.contains(&family_id) {
            let mut node = GraphNode::new(
                family_id.as_str(),
                EntityKind::SynthesizedFamily,
                format!("{} - Control Family", family),
            );
            node.frequency = members.len() as u64;
            node.properties
                .insert("family".to_string(), serde_json::Value::from(family.as_str()));
            graph.add_node(node);
            created += 1;
        }

        for member in members {
            graph.add_relation(
                Relation::new(family_id.as_str(), member, RelationKind::Hierarchy)
                    .with_property("hierarchy_level", "family->member"),
            )?;
        }
    }
    Ok(created)
}

/// Build a graph from an in-memory corpus, batching by `options.batch_size`.
pub fn build_from_corpus(
    documents: &[CorpusDocument],
    options: BuildOptions,
) -> Result<(KnowledgeGraph, BuildReport)> {
    build_with_concepts(documents, options, ConceptDictionary::default())
}

pub fn build_with_concepts(
    documents: &[CorpusDocument],
    options: BuildOptions,
    concepts: ConceptDictionary,
) -> Result<(KnowledgeGraph, BuildReport)> {
    let batch_size = options.batch_size.max(1);
    let mut builder = GraphBuilder::with_concepts(options, concepts);
    for batch in documents.chunks(batch_size) {
        builder.ingest_batch(batch);
    }
    builder.finish()
}
