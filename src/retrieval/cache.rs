use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use serde::Serialize;

use crate::Result;

use super::traits::Embedder;

/// Memoising wrapper around an [`Embedder`].
///
/// Keys are blake3 hashes of the trimmed, lowercased text plus the model id,
/// so entity names looked up on every query are embedded once.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Cache<String, Vec<f32>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: u64,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::builder().max_capacity(capacity.max(1)).build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn cache_key(text: &str, model_id: &str) -> String {
        let normalized = text.trim().to_lowercase();
        let hash = blake3::hash(format!("{}:{}", normalized, model_id).as_bytes());
        hash.to_hex().to_string()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.cache.entry_count(),
        }
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = Self::cache_key(text, self.inner.model_id());
        if let Some(vec) = self.cache.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(vec);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        // errors are not cached; the next call retries upstream
        let vec = self.inner.embed(text).await?;
        self.cache.insert(key, vec.clone()).await;
        Ok(vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FailingEmbedder, MockEmbedder};

    #[tokio::test]
    async fn test_cache_hits_and_normalisation() {
        let cached = CachedEmbedder::new(Arc::new(MockEmbedder::new(16)), 10);

        let first = cached.embed("Access Control").await.unwrap();
        let second = cached.embed("  access control ").await.unwrap();
        assert_eq!(first, second);

        let stats = cached.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(cached.dimensions(), 16);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cached = CachedEmbedder::new(Arc::new(FailingEmbedder), 10);
        assert!(cached.embed("AC-2").await.is_err());
        assert!(cached.embed("AC-2").await.is_err());
        assert_eq!(cached.stats().misses, 2);
    }
}
