//! Upstream collaborators consumed by retrieval.

use async_trait::async_trait;

use crate::types::{CorpusDocument, Passage};
use crate::Result;

/// Similarity index over passages.
///
/// Failures surface as `AppError::Upstream`; timeouts and cancellation are
/// the implementation's concern.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Up to `k` passages, most similar first.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<Passage>>;

    /// Stored documents for corpus ingestion; `None` means all.
    async fn enumerate(&self, limit: Option<usize>) -> Result<Vec<CorpusDocument>>;
}

/// Text to fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifies the model; part of every cache key.
    fn model_id(&self) -> &str;

    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
