//! Graph-enhanced retrieval
//!
//! - `traits`: vector store and embedding service interfaces
//! - `cache`: memoising embedder
//! - `context`: citation rendering
//! - `engine`: the staged query pipeline

pub mod cache;
pub mod context;
pub mod engine;
pub mod traits;

pub use cache::{CacheStats, CachedEmbedder};
pub use context::render_context;
pub use engine::{
    GraphRag, QueryRequest, StatisticsReport, ENTITY_ERROR, GRAPH_ERROR, LOOKUP_ERROR,
    VECTOR_ERROR,
};
pub use traits::{Embedder, VectorStore};
