//! Persistence backend trait for graph snapshots.

use async_trait::async_trait;

use crate::graph::KnowledgeGraph;
use crate::Result;

use super::tables::SnapshotMeta;

/// Whole-snapshot persistence. A save replaces the previous snapshot; a load
/// validates endpoint integrity and the stored fingerprint before returning.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Whether a snapshot has been written.
    fn exists(&self) -> bool;

    async fn save(&self, graph: &KnowledgeGraph) -> Result<SnapshotMeta>;

    /// `AppError::NotFound` when no snapshot exists.
    async fn load(&self) -> Result<KnowledgeGraph>;

    async fn meta(&self) -> Result<SnapshotMeta>;
}
