//! Source catalogs and target executors.
//!
//! The engine never talks to a database. A [`SourceCatalog`] supplies the
//! metadata it plans from and a [`TargetExecutor`] carries out the plan.

pub mod recording;
pub mod script;
pub mod snapshot;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use schemashift_core::{
    CollectionId, CollectionStats, DatabaseFilter, IndexDefinition, ShardKey, TargetOperation,
};

use crate::error::Result;

/// Read-only view of the source deployment's metadata.
///
/// Implement this trait to plan from a new kind of source.
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// Catalog type name.
    fn catalog_type(&self) -> &'static str;

    /// Opens the catalog and validates its configuration.
    async fn connect(&mut self) -> Result<()>;

    /// Collections of the databases `filter` admits.
    async fn list_collections(&self, filter: &DatabaseFilter) -> Result<Vec<CollectionId>>;

    /// Indexes of one collection, in source order.
    async fn get_indexes(&self, id: &CollectionId) -> Result<Vec<IndexDefinition>>;

    /// Shard key of one collection, `None` when unsharded.
    async fn get_shard_key(&self, id: &CollectionId) -> Result<Option<ShardKey>>;

    /// True if the collection exists, listed or not.
    async fn collection_exists(&self, id: &CollectionId) -> Result<bool>;

    /// Document and shard key statistics, when the source can provide them.
    async fn get_stats(&self, _id: &CollectionId) -> Result<Option<CollectionStats>> {
        Ok(None)
    }

    /// Releases resources.
    async fn close(&mut self) -> Result<()>;
}

/// Applies plan operations to the target deployment.
#[async_trait]
pub trait TargetExecutor: Send + Sync {
    /// Executor type name.
    fn executor_type(&self) -> &'static str;

    /// Drops a collection if it exists.
    async fn drop_collection(&mut self, id: &CollectionId) -> Result<()>;

    /// Creates a collection, placed with `colocate_with` when given.
    async fn create_collection(
        &mut self,
        id: &CollectionId,
        colocate_with: Option<&CollectionId>,
    ) -> Result<()>;

    /// Shards a collection.
    async fn shard_collection(&mut self, id: &CollectionId, key: &ShardKey) -> Result<()>;

    /// Creates one index.
    async fn create_index(&mut self, id: &CollectionId, index: &IndexDefinition) -> Result<()>;

    /// Flushes anything buffered. Called once after the last operation.
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Dispatches one plan operation to `executor`.
///
/// # Errors
///
/// Returns whatever the executor returns.
pub async fn execute(executor: &mut dyn TargetExecutor, operation: &TargetOperation) -> Result<()> {
    match operation {
        TargetOperation::DropCollection { collection } => executor.drop_collection(collection).await,
        TargetOperation::CreateCollection {
            collection,
            colocate_with,
        } => {
            executor
                .create_collection(collection, colocate_with.as_ref())
                .await
        }
        TargetOperation::ShardCollection { collection, key } => {
            executor.shard_collection(collection, key).await
        }
        TargetOperation::CreateIndex { collection, index } => {
            executor.create_index(collection, index).await
        }
    }
}

/// Source catalog configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceConfig {
    /// Metadata exported to a JSON file.
    #[serde(rename = "snapshot")]
    Snapshot(snapshot::SnapshotConfig),
}

/// Target executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TargetConfig {
    /// Write a `mongosh` script.
    #[serde(rename = "script")]
    Script(script::ScriptConfig),
    /// Record operations in memory (dry run).
    #[serde(rename = "recording")]
    Recording,
}

impl SourceConfig {
    /// Snapshot catalog reading `path`.
    #[must_use]
    pub fn snapshot(path: impl Into<PathBuf>) -> Self {
        Self::Snapshot(snapshot::SnapshotConfig { path: path.into() })
    }
}

/// Creates a source catalog from configuration.
#[must_use]
pub fn create_catalog(config: &SourceConfig) -> Box<dyn SourceCatalog> {
    match config {
        SourceConfig::Snapshot(cfg) => Box::new(snapshot::SnapshotCatalog::new(cfg.clone())),
    }
}

/// Creates a target executor from configuration.
#[must_use]
pub fn create_executor(config: &TargetConfig) -> Box<dyn TargetExecutor> {
    match config {
        TargetConfig::Script(cfg) => Box::new(script::ScriptExecutor::new(cfg.clone())),
        TargetConfig::Recording => Box::new(recording::RecordingExecutor::new()),
    }
}
