use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::graph::KnowledgeGraph;
use crate::types::{AppError, Result};

use super::tables::{GraphTables, SnapshotMeta};
use super::traits::GraphStore;

pub const NODES_FILE: &str = "nodes.json";
pub const EDGES_FILE: &str = "edges.json";
pub const REGISTRY_FILE: &str = "registry.json";
pub const META_FILE: &str = "meta.json";

/// Snapshot as a directory of plain JSON arrays, one file per table.
///
/// Readable and writable by any JSON tooling. `meta.json` is written last by
/// [`GraphStore::save`] and its fingerprint is checked on load when present;
/// a directory holding only the three tables loads with endpoint checks alone.
#[derive(Debug, Clone)]
pub struct JsonGraphStore {
    dir: PathBuf,
}

impl JsonGraphStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(value)?;
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                AppError::NotFound(format!("graph table {}", path.display()))
            }
            _ => AppError::from(e),
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn read_meta(dir: &Path) -> Result<Option<SnapshotMeta>> {
        match Self::read_file(&dir.join(META_FILE)) {
            Ok(meta) => Ok(Some(meta)),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn write_tables(dir: &Path, tables: &GraphTables, meta: &SnapshotMeta) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        // a stale meta file never vouches for partially rewritten tables
        let meta_path = dir.join(META_FILE);
        if meta_path.exists() {
            std::fs::remove_file(&meta_path)?;
        }
        Self::write_file(&dir.join(NODES_FILE), &tables.nodes)?;
        Self::write_file(&dir.join(EDGES_FILE), &tables.edges)?;
        Self::write_file(&dir.join(REGISTRY_FILE), &tables.registry)?;
        Self::write_file(&meta_path, meta)?;
        Ok(())
    }

    fn read_tables(dir: &Path) -> Result<(GraphTables, Option<SnapshotMeta>)> {
        let meta = Self::read_meta(dir)?;
        let tables = GraphTables {
            nodes: Self::read_file(&dir.join(NODES_FILE))?,
            edges: Self::read_file(&dir.join(EDGES_FILE))?,
            registry: Self::read_file(&dir.join(REGISTRY_FILE))?,
        };
        Ok((tables, meta))
    }
}

#[async_trait]
impl GraphStore for JsonGraphStore {
    fn name(&self) -> &'static str {
        "json"
    }

    fn exists(&self) -> bool {
        self.dir.join(NODES_FILE).exists()
    }

    async fn save(&self, graph: &KnowledgeGraph) -> Result<SnapshotMeta> {
        let tables = GraphTables::from_graph(graph);
        let meta = tables.meta()?;
        let dir = self.dir.clone();
        let written = meta.clone();

        tokio::task::spawn_blocking(move || Self::write_tables(&dir, &tables, &written))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

        tracing::info!(
            dir = %self.dir.display(),
            nodes = meta.nodes,
            edges = meta.edges,
            "Saved graph snapshot"
        );
        Ok(meta)
    }

    async fn load(&self) -> Result<KnowledgeGraph> {
        let dir = self.dir.clone();
        let (tables, meta) = tokio::task::spawn_blocking(move || Self::read_tables(&dir))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

        match &meta {
            Some(meta) => tables.verify(meta)?,
            None => tracing::debug!(
                dir = %self.dir.display(),
                "No meta file, skipping fingerprint check"
            ),
        }
        let graph = tables.into_graph()?;
        tracing::info!(
            dir = %self.dir.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Loaded graph snapshot"
        );
        Ok(graph)
    }

    /// Stored metadata, or metadata derived from the tables when the
    /// snapshot has no meta file.
    async fn meta(&self) -> Result<SnapshotMeta> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || -> Result<SnapshotMeta> {
            if let Some(meta) = Self::read_meta(&dir)? {
                return Ok(meta);
            }
            let (tables, _) = Self::read_tables(&dir)?;
            let mut meta = tables.meta()?;
            meta.built_at = std::fs::metadata(dir.join(NODES_FILE))?.modified()?.into();
            Ok(meta)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }
}
