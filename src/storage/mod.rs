//! Graph snapshot persistence
//!
//! - `tables`: node / edge / registry row schema and integrity checks
//! - `traits`: `GraphStore` backend trait
//! - `redb_store`: single-file redb backend
//! - `json_store`: directory of JSON tables

pub mod json_store;
pub mod redb_store;
pub mod tables;
pub mod traits;

use std::path::Path;
use std::sync::Arc;

use crate::config::StoreFormat;

pub use json_store::JsonGraphStore;
pub use redb_store::RedbGraphStore;
pub use tables::{GraphTables, SnapshotMeta, SCHEMA_VERSION};
pub use traits::GraphStore;

pub fn open_store(format: StoreFormat, dir: &Path) -> Arc<dyn GraphStore> {
    match format {
        StoreFormat::Redb => Arc::new(RedbGraphStore::new(dir)),
        StoreFormat::Json => Arc::new(JsonGraphStore::new(dir)),
    }
}
