use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::knowledge_graph::KnowledgeGraph;

/// Holder of the currently published graph snapshot.
///
/// A published graph is never mutated. Builders produce a fresh
/// [`KnowledgeGraph`] and swap it in with [`GraphHandle::publish`]; readers
/// take an `Arc` clone and release the lock immediately.
#[derive(Debug, Default)]
pub struct GraphHandle {
    current: RwLock<Arc<KnowledgeGraph>>,
    generation: AtomicU64,
}

impl GraphHandle {
    pub fn new(graph: KnowledgeGraph) -> Self {
        Self {
            current: RwLock::new(Arc::new(graph)),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn current(&self) -> Arc<KnowledgeGraph> {
        self.current.read().await.clone()
    }

    /// Replace the published snapshot, returning the new generation number.
    pub async fn publish(&self, graph: KnowledgeGraph) -> u64 {
        let next = Arc::new(graph);
        let nodes = next.node_count();
        {
            let mut current = self.current.write().await;
            *current = next;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(generation, nodes, "Published knowledge graph");
        generation
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
