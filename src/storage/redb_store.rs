use std::path::{Path, PathBuf};

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, TableError};

use crate::graph::{GraphNode, KnowledgeGraph};
use crate::types::{AppError, Entity, Relation, Result};

use super::tables::{GraphTables, SnapshotMeta};
use super::traits::GraphStore;

const NODES_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("nodes");
const EDGES_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("edges");
const REGISTRY_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("registry");
const META_TABLE: TableDefinition<&str, &str> = TableDefinition::new("meta");
const META_KEY_SNAPSHOT: &str = "snapshot";

pub const REDB_FILE: &str = "graph.redb";

/// Snapshot in a single redb file. Row values are JSON; node and edge rows
/// are keyed by position so insertion order survives a round trip.
#[derive(Debug, Clone)]
pub struct RedbGraphStore {
    path: PathBuf,
}

impl RedbGraphStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(REDB_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(path: &Path, tables: &GraphTables, meta: &SnapshotMeta) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        write_txn.delete_table(NODES_TABLE)?;
        write_txn.delete_table(EDGES_TABLE)?;
        write_txn.delete_table(REGISTRY_TABLE)?;
        {
            let mut nodes = write_txn.open_table(NODES_TABLE)?;
            for (pos, node) in tables.nodes.iter().enumerate() {
                let bytes = serde_json::to_vec(node)?;
                nodes.insert(pos as u64, bytes.as_slice())?;
            }

            let mut edges = write_txn.open_table(EDGES_TABLE)?;
            for (pos, edge) in tables.edges.iter().enumerate() {
                let bytes = serde_json::to_vec(edge)?;
                edges.insert(pos as u64, bytes.as_slice())?;
            }

            let mut registry = write_txn.open_table(REGISTRY_TABLE)?;
            for entity in &tables.registry {
                let bytes = serde_json::to_vec(entity)?;
                registry.insert(entity.id.as_str(), bytes.as_slice())?;
            }

            let mut meta_table = write_txn.open_table(META_TABLE)?;
            let meta_json = serde_json::to_string(meta)?;
            meta_table.insert(META_KEY_SNAPSHOT, meta_json.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn open(path: &Path) -> Result<Database> {
        if !path.exists() {
            return Err(AppError::NotFound(format!(
                "graph snapshot {}",
                path.display()
            )));
        }
        Ok(Database::open(path)?)
    }

    fn read_meta(db: &Database) -> Result<SnapshotMeta> {
        let read_txn = db.begin_read()?;
        let meta_table = match read_txn.open_table(META_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => {
                return Err(AppError::NotFound("graph snapshot metadata".to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let raw = meta_table
            .get(META_KEY_SNAPSHOT)?
            .ok_or_else(|| AppError::NotFound("graph snapshot metadata".to_string()))?;
        Ok(serde_json::from_str(raw.value())?)
    }

    fn read(path: &Path) -> Result<(GraphTables, SnapshotMeta)> {
        let db = Self::open(path)?;
        let meta = Self::read_meta(&db)?;

        let read_txn = db.begin_read()?;
        let mut tables = GraphTables::default();

        let nodes = read_txn.open_table(NODES_TABLE)?;
        for entry in nodes.iter()? {
            let (_, value) = entry?;
            tables.nodes.push(serde_json::from_slice::<GraphNode>(value.value())?);
        }

        let edges = read_txn.open_table(EDGES_TABLE)?;
        for entry in edges.iter()? {
            let (_, value) = entry?;
            tables.edges.push(serde_json::from_slice::<Relation>(value.value())?);
        }

        let registry = read_txn.open_table(REGISTRY_TABLE)?;
        for entry in registry.iter()? {
            let (_, value) = entry?;
            tables.registry.push(serde_json::from_slice::<Entity>(value.value())?);
        }

        Ok((tables, meta))
    }
}

#[async_trait]
impl GraphStore for RedbGraphStore {
    fn name(&self) -> &'static str {
        "redb"
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    async fn save(&self, graph: &KnowledgeGraph) -> Result<SnapshotMeta> {
        let tables = GraphTables::from_graph(graph);
        let meta = tables.meta()?;
        let path = self.path.clone();
        let written = meta.clone();

        tokio::task::spawn_blocking(move || Self::write(&path, &tables, &written))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

        tracing::info!(
            path = %self.path.display(),
            nodes = meta.nodes,
            edges = meta.edges,
            "Saved graph snapshot"
        );
        Ok(meta)
    }

    async fn load(&self) -> Result<KnowledgeGraph> {
        let path = self.path.clone();
        let (tables, meta) = tokio::task::spawn_blocking(move || Self::read(&path))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

        tables.verify(&meta)?;
        let graph = tables.into_graph()?;
        tracing::info!(
            path = %self.path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            built_at = %meta.built_at,
            "Loaded graph snapshot"
        );
        Ok(graph)
    }

    async fn meta(&self) -> Result<SnapshotMeta> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let db = Self::open(&path)?;
            Self::read_meta(&db)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_same_graph, sample_multigraph};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_round_trip_empty_single_and_multigraph() {
        let dir = tempdir().unwrap();
        let store = RedbGraphStore::new(dir.path());

        let mut single = KnowledgeGraph::new();
        single.add_node(GraphNode::new(
            "AC-2",
            crate::types::EntityKind::CodeIdentifier,
            "Control AC-2",
        ));

        for graph in [KnowledgeGraph::new(), single, sample_multigraph()] {
            store.save(&graph).await.unwrap();
            let loaded = store.load().await.unwrap();
            assert_same_graph(&graph, &loaded);
        }
    }

    #[tokio::test]
    async fn test_save_replaces_previous_snapshot() {
        let dir = tempdir().unwrap();
        let store = RedbGraphStore::new(dir.path());

        store.save(&sample_multigraph()).await.unwrap();
        store.save(&KnowledgeGraph::new()).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert!(loaded.is_empty());
        assert_eq!(store.meta().await.unwrap().nodes, 0);
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_not_found() {
        let dir = tempdir().unwrap();
        let store = RedbGraphStore::new(&dir.path().join("nothing"));
        assert!(!store.exists());
        assert!(matches!(store.load().await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_dangling_edge_rejected_on_load() {
        let dir = tempdir().unwrap();
        let store = RedbGraphStore::new(dir.path());

        let tables = GraphTables {
            nodes: vec![GraphNode::new(
                "AC-2",
                crate::types::EntityKind::CodeIdentifier,
                "Control AC-2",
            )],
            edges: vec![Relation::new(
                "FAMILY-AC",
                "AC-2",
                crate::types::RelationKind::Hierarchy,
            )],
            registry: Vec::new(),
        };
        let meta = tables.meta().unwrap();
        RedbGraphStore::write(store.path(), &tables, &meta).unwrap();

        assert!(matches!(
            store.load().await,
            Err(AppError::GraphIntegrity(_))
        ));
    }
}
