//! Source catalog backed by an exported JSON metadata file.
//!
//! ```json
//! {
//!   "collections": [
//!     {
//!       "database": "shop",
//!       "collection": "orders",
//!       "indexes": [
//!         {"name": "_id_", "key": {"_id": 1}, "v": 2},
//!         {"name": "status_1_createdAt_-1", "key": {"status": 1, "createdAt": -1}}
//!       ],
//!       "shard_key": "customerId",
//!       "stats": {"document_count": 120000, "distinct_shard_key_values": 8000}
//!     }
//!   ]
//! }
//! ```
//!
//! Key members are read in file order. A bare string shard key is the RU
//! form and means hashed; an object is read as an index key.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use schemashift_core::{
    CollectionId, CollectionStats, DatabaseFilter, IndexDefinition, ShardKey, SourceCollection,
};

use crate::connectors::SourceCatalog;
use crate::error::{Error, Result};

/// Configuration for the snapshot catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Path to the JSON file.
    pub path: PathBuf,
}

/// One collection as exported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotCollection {
    /// Database name.
    pub database: String,
    /// Collection name.
    pub collection: String,
    /// Indexes in source order.
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
    /// Shard key, absent when unsharded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_key: Option<ShardKey>,
    /// Optional statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<CollectionStats>,
}

impl SnapshotCollection {
    /// Identity of the collection.
    #[must_use]
    pub fn id(&self) -> CollectionId {
        CollectionId::new(self.database.clone(), self.collection.clone())
    }
}

impl From<&SourceCollection> for SnapshotCollection {
    fn from(source: &SourceCollection) -> Self {
        Self {
            database: source.id.database.clone(),
            collection: source.id.collection.clone(),
            indexes: source.indexes.clone(),
            shard_key: source.shard_key.clone(),
            stats: source.stats,
        }
    }
}

/// The exported file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotDocument {
    /// Exported collections.
    #[serde(default)]
    pub collections: Vec<SnapshotCollection>,
}

/// Snapshot catalog.
pub struct SnapshotCatalog {
    config: SnapshotConfig,
    collections: BTreeMap<CollectionId, SnapshotCollection>,
}

impl SnapshotCatalog {
    /// Creates a catalog; the file is read on [`SourceCatalog::connect`].
    #[must_use]
    pub fn new(config: SnapshotConfig) -> Self {
        Self {
            config,
            collections: BTreeMap::new(),
        }
    }

    fn lookup(&self, id: &CollectionId) -> Result<&SnapshotCollection> {
        self.collections
            .get(id)
            .ok_or_else(|| Error::Metadata(format!("collection {id} is not in the snapshot")))
    }
}

#[async_trait]
impl SourceCatalog for SnapshotCatalog {
    fn catalog_type(&self) -> &'static str {
        "snapshot"
    }

    async fn connect(&mut self) -> Result<()> {
        let file = File::open(&self.config.path).map_err(|e| {
            Error::SourceConnection(format!(
                "Failed to open snapshot '{}': {}",
                self.config.path.display(),
                e
            ))
        })?;
        let document: SnapshotDocument = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Metadata(format!("Failed to parse snapshot: {e}")))?;

        let mut collections = BTreeMap::new();
        for collection in document.collections {
            let id = collection.id();
            if collections.insert(id.clone(), collection).is_some() {
                return Err(Error::Metadata(format!("collection {id} listed twice")));
            }
        }
        tracing::debug!(
            path = %self.config.path.display(),
            collections = collections.len(),
            "snapshot loaded"
        );
        self.collections = collections;
        Ok(())
    }

    async fn list_collections(&self, filter: &DatabaseFilter) -> Result<Vec<CollectionId>> {
        Ok(self
            .collections
            .keys()
            .filter(|id| filter.admits(&id.database))
            .cloned()
            .collect())
    }

    async fn get_indexes(&self, id: &CollectionId) -> Result<Vec<IndexDefinition>> {
        Ok(self.lookup(id)?.indexes.clone())
    }

    async fn get_shard_key(&self, id: &CollectionId) -> Result<Option<ShardKey>> {
        Ok(self.lookup(id)?.shard_key.clone())
    }

    async fn collection_exists(&self, id: &CollectionId) -> Result<bool> {
        Ok(self.collections.contains_key(id))
    }

    async fn get_stats(&self, id: &CollectionId) -> Result<Option<CollectionStats>> {
        Ok(self.lookup(id)?.stats)
    }

    async fn close(&mut self) -> Result<()> {
        self.collections.clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
