//! Discovery, planning and application.

use futures::stream::{self, StreamExt, TryStreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info, warn};

use schemashift_core::{
    CollectionId, Orchestrator, SourceCollection, SourceSnapshot, TargetOperation,
    TransformationPlan,
};

use crate::config::ToolSettings;
use crate::connectors::{execute, SourceCatalog, TargetExecutor};
use crate::error::Result;
use crate::retry::{is_retryable_error, with_retry, RetryConfig};

/// Apply statistics.
#[derive(Debug, Default, Clone)]
pub struct ApplyStats {
    /// Collections processed.
    pub collections: u64,
    /// Operations executed.
    pub operations: u64,
    /// Retries across all operations.
    pub retries: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
}

/// Planning and apply pipeline.
pub struct Pipeline {
    orchestrator: Orchestrator,
    catalog: Box<dyn SourceCatalog>,
    workers: usize,
    retry: RetryConfig,
    show_progress: bool,
}

impl Pipeline {
    /// Creates a pipeline over `catalog`.
    #[must_use]
    pub fn new(
        orchestrator: Orchestrator,
        catalog: Box<dyn SourceCatalog>,
        settings: &ToolSettings,
    ) -> Self {
        Self {
            orchestrator,
            catalog,
            workers: settings.workers.max(1),
            retry: settings.retry_config(),
            show_progress: false,
        }
    }

    /// Shows a progress bar while applying.
    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Reads the source metadata the rules need.
    ///
    /// Only selected collections are fetched with metadata. Other listed
    /// collections, and unlisted anchors confirmed by the catalog, are
    /// recorded as known anchors.
    ///
    /// The catalog is closed whether or not discovery succeeds.
    ///
    /// # Errors
    ///
    /// Returns the first catalog error that survives retries.
    pub async fn discover(&mut self) -> Result<SourceSnapshot> {
        let start = Instant::now();
        self.catalog.connect().await?;

        let discovered = self.read_snapshot().await;
        let closed = self.catalog.close().await;
        let snapshot = match (discovered, closed) {
            (Ok(snapshot), Ok(())) => snapshot,
            (Ok(_), Err(e)) => return Err(e),
            (Err(e), closed) => {
                if let Err(close_error) = closed {
                    warn!(error = %close_error, "failed to close the source catalog");
                }
                return Err(e);
            }
        };

        info!(
            collections = snapshot.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "discovery complete"
        );
        Ok(snapshot)
    }

    async fn read_snapshot(&self) -> Result<SourceSnapshot> {
        let catalog = self.catalog.as_ref();
        let retry = &self.retry;
        let rules = self.orchestrator.rules();
        let filter = rules.database_filter();
        let listed = with_retry(retry, "list_collections", || catalog.list_collections(&filter)).await?;
        let (selected, unselected): (Vec<_>, Vec<_>) = listed
            .into_iter()
            .partition(|id| rules.resolve(id).is_some());
        info!(
            catalog = catalog.catalog_type(),
            listed = selected.len() + unselected.len(),
            selected = selected.len(),
            "source collections listed"
        );

        let collections: Vec<SourceCollection> = stream::iter(selected.iter())
            .map(|id| fetch_collection(catalog, retry, id))
            .buffer_unordered(self.workers)
            .try_collect()
            .await?;
        let mut snapshot = SourceSnapshot::from_collections(collections)?;
        for id in unselected {
            snapshot.add_known_anchor(id);
        }

        let anchors: BTreeSet<CollectionId> = self
            .orchestrator
            .resolve_all(&snapshot)
            .iter()
            .filter_map(|config| config.anchor())
            .filter(|anchor| !snapshot.contains(anchor))
            .collect();
        for anchor in anchors {
            if with_retry(retry, "collection_exists", || catalog.collection_exists(&anchor)).await? {
                debug!(anchor = %anchor, "unlisted anchor exists in the source");
                snapshot.add_known_anchor(anchor);
            }
        }
        Ok(snapshot)
    }

    /// Discovers the source and builds the plan.
    ///
    /// # Errors
    ///
    /// Returns catalog errors and any fatal engine error.
    pub async fn plan(&mut self) -> Result<TransformationPlan> {
        let snapshot = self.discover().await?;
        Ok(self.orchestrator.build(&snapshot)?)
    }

    /// Applies `plan` in dependency order.
    ///
    /// # Errors
    ///
    /// Stops at the first operation that fails after retries.
    pub async fn apply(
        &self,
        plan: &TransformationPlan,
        executor: &mut dyn TargetExecutor,
    ) -> Result<ApplyStats> {
        let start = Instant::now();
        let mut stats = ApplyStats::default();
        let order = plan.execution_order();
        let total: usize = order.iter().map(|entry| entry.operations().len()).sum();
        let progress = self.progress_bar(total as u64);
        info!(
            executor = executor.executor_type(),
            collections = order.len(),
            operations = total,
            "applying plan"
        );

        for entry in order {
            progress.set_message(entry.id.to_string());
            for operation in entry.operations() {
                stats.retries += execute_with_retry(&self.retry, executor, &operation).await?;
                stats.operations += 1;
                progress.inc(1);
            }
            stats.collections += 1;
        }
        executor.finish().await?;
        progress.finish_with_message("plan applied");

        stats.duration_secs = start.elapsed().as_secs_f64();
        info!(
            collections = stats.collections,
            operations = stats.operations,
            retries = stats.retries,
            "apply complete in {:.2}s",
            stats.duration_secs
        );
        Ok(stats)
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }
}

async fn fetch_collection(
    catalog: &dyn SourceCatalog,
    retry: &RetryConfig,
    id: &CollectionId,
) -> Result<SourceCollection> {
    let indexes = with_retry(retry, "get_indexes", || catalog.get_indexes(id)).await?;
    let shard_key = with_retry(retry, "get_shard_key", || catalog.get_shard_key(id)).await?;
    let stats = with_retry(retry, "get_stats", || catalog.get_stats(id)).await?;

    let mut collection = SourceCollection::new(id.clone()).with_indexes(indexes);
    if let Some(key) = shard_key {
        collection = collection.with_shard_key(key);
    }
    if let Some(stats) = stats {
        collection = collection.with_stats(stats);
    }
    debug!(collection = %id, indexes = collection.indexes.len(), "metadata fetched");
    Ok(collection)
}

/// Runs one operation, retrying transient failures. Returns the retry count.
async fn execute_with_retry(
    config: &RetryConfig,
    executor: &mut dyn TargetExecutor,
    operation: &TargetOperation,
) -> Result<u64> {
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            tokio::time::sleep(config.delay_for_attempt(attempt)).await;
        }
        match execute(executor, operation).await {
            Ok(()) => return Ok(u64::from(attempt)),
            Err(e) if attempt < config.max_retries && is_retryable_error(&e) => {
                warn!(operation = %operation, attempt = attempt + 1, error = %e, "retrying operation");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
