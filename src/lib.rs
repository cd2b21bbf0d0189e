pub mod config;
pub mod extract;
pub mod graph;
pub mod retrieval;
pub mod storage;
pub mod types;

#[cfg(test)]
pub mod test_utils;

pub use config::{AppConfig, BuildOptions, RetrievalConfig, StoreFormat};
pub use graph::{GraphHandle, KnowledgeGraph};
pub use retrieval::{GraphRag, QueryRequest};
pub use types::error::{AppError, Result};
