//! In-memory executor used for dry runs and tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

use schemashift_core::{CollectionId, IndexDefinition, ShardKey, TargetOperation};

use crate::connectors::TargetExecutor;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Journal {
    operations: Vec<TargetOperation>,
    transient_failures: u32,
    finished: bool,
}

/// Shared view of what a [`RecordingExecutor`] received.
#[derive(Debug, Clone, Default)]
pub struct RecordingLog(Arc<Mutex<Journal>>);

impl RecordingLog {
    /// Operations recorded so far, in order.
    #[must_use]
    pub fn operations(&self) -> Vec<TargetOperation> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .operations
            .clone()
    }

    /// True once the executor was finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).finished
    }
}

/// Executor that records every operation.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    log: RecordingLog,
}

impl RecordingExecutor {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `count` operations with a transient error.
    #[must_use]
    pub fn with_transient_failures(self, count: u32) -> Self {
        self.log
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .transient_failures = count;
        self
    }

    /// Handle that stays valid after the executor is boxed.
    #[must_use]
    pub fn log(&self) -> RecordingLog {
        self.log.clone()
    }

    fn record(&self, operation: TargetOperation) -> Result<()> {
        let mut journal = self.log.0.lock().unwrap_or_else(PoisonError::into_inner);
        if journal.transient_failures > 0 {
            journal.transient_failures -= 1;
            return Err(Error::Transient(format!("injected failure on {operation}")));
        }
        journal.operations.push(operation);
        Ok(())
    }
}

#[async_trait]
impl TargetExecutor for RecordingExecutor {
    fn executor_type(&self) -> &'static str {
        "recording"
    }

    async fn drop_collection(&mut self, id: &CollectionId) -> Result<()> {
        self.record(TargetOperation::DropCollection {
            collection: id.clone(),
        })
    }

    async fn create_collection(
        &mut self,
        id: &CollectionId,
        colocate_with: Option<&CollectionId>,
    ) -> Result<()> {
        self.record(TargetOperation::CreateCollection {
            collection: id.clone(),
            colocate_with: colocate_with.cloned(),
        })
    }

    async fn shard_collection(&mut self, id: &CollectionId, key: &ShardKey) -> Result<()> {
        self.record(TargetOperation::ShardCollection {
            collection: id.clone(),
            key: key.clone(),
        })
    }

    async fn create_index(&mut self, id: &CollectionId, index: &IndexDefinition) -> Result<()> {
        self.record(TargetOperation::CreateIndex {
            collection: id.clone(),
            index: index.clone(),
        })
    }

    async fn finish(&mut self) -> Result<()> {
        self.log.0.lock().unwrap_or_else(PoisonError::into_inner).finished = true;
        Ok(())
    }
}
