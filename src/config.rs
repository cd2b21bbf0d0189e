use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::extract::ConceptDictionary;
use crate::types::{AppError, Result};

/// On-disk layout for the persisted graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreFormat {
    /// Single `graph.redb` file.
    #[default]
    Redb,
    /// Directory of `nodes.json`, `edges.json`, `registry.json`.
    Json,
}

impl std::str::FromStr for StoreFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "redb" => Ok(Self::Redb),
            "json" => Ok(Self::Json),
            _ => Err(AppError::Input(format!("Unknown store format: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildOptions {
    pub enable_cooccurrence: bool,
    pub enable_hierarchy: bool,
    /// Documents handed to one parallel extraction pass.
    pub batch_size: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            enable_cooccurrence: true,
            enable_hierarchy: true,
            batch_size: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrievalConfig {
    pub top_k_vector: usize,
    pub max_graph_depth: usize,
    /// Passages requested per related entity in the secondary lookup.
    pub entity_lookup_k: usize,
    pub max_paths: usize,
    /// Cap on related entities that get a secondary lookup.
    pub max_graph_entities: usize,
    pub embedding_cache_size: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k_vector: 6,
            max_graph_depth: 2,
            entity_lookup_k: 2,
            max_paths: 5,
            max_graph_entities: 20,
            embedding_cache_size: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub store_format: StoreFormat,
    /// JSON concept table; the built-in table is used when unset.
    pub concepts_path: Option<PathBuf>,
    pub build: BuildOptions,
    pub retrieval: RetrievalConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
            store_format: StoreFormat::default(),
            concepts_path: None,
            build: BuildOptions::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn graph_dir(&self) -> PathBuf {
        self.data_dir.join("graph")
    }

    pub fn load_concepts(&self) -> Result<ConceptDictionary> {
        match &self.concepts_path {
            Some(path) => ConceptDictionary::from_json_file(path),
            None => Ok(ConceptDictionary::default()),
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("graph-rag")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.data_dir.ends_with("graph-rag"));
        assert_eq!(config.graph_dir(), config.data_dir.join("graph"));
        assert!(config.build.enable_cooccurrence && config.build.enable_hierarchy);
        assert_eq!(config.retrieval.max_paths, 5);
        assert!(!config.load_concepts().unwrap().is_empty());
    }

    #[test]
    fn test_store_format_parse() {
        assert_eq!(StoreFormat::from_str("JSON").unwrap(), StoreFormat::Json);
        assert!(StoreFormat::from_str("sqlite").is_err());
    }
}
