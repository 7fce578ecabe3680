//! Transformation orchestrator.
//!
//! Composes pattern resolution, shard key resolution, index reduction and
//! colocation planning into one [`TransformationPlan`]. Any fatal error
//! aborts the build: there is no partial plan.

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::colocation::ColocationPlanner;
use crate::config::{ResolvedCollectionConfig, SectionConfig, SectionsDocument};
use crate::error::{Error, Result};
use crate::model::{SourceCollection, SourceSnapshot, TS_FIELD};
use crate::pattern::RuleSet;
use crate::plan::{PlanEntry, TransformationPlan};
use crate::redundancy::{RedundancyAnalyzer, Reduction};
use crate::shard_key::ShardKeyResolver;

/// Owns the compiled rules for one or more plan builds.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    rules: RuleSet,
    shard_keys: ShardKeyResolver,
}

impl Orchestrator {
    /// Compiles `sections`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty section list or a bad pattern.
    pub fn new(sections: &[SectionConfig]) -> Result<Self> {
        Ok(Self {
            rules: RuleSet::compile(sections)?,
            shard_keys: ShardKeyResolver::default(),
        })
    }

    /// Compiles the sections of a loaded document.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn from_document(document: &SectionsDocument) -> Result<Self> {
        Self::new(&document.sections)
    }

    /// Sets the distinct-value count below which a retained shard key is
    /// flagged.
    #[must_use]
    pub fn with_low_cardinality_threshold(mut self, threshold: u64) -> Self {
        self.shard_keys = ShardKeyResolver::with_low_cardinality_threshold(threshold);
        self
    }

    /// Compiled rules.
    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Effective configuration of every selected snapshot collection, in
    /// `(database, collection)` order.
    #[must_use]
    pub fn resolve_all(&self, snapshot: &SourceSnapshot) -> Vec<ResolvedCollectionConfig> {
        self.selected(snapshot).map(|(_, config)| config).collect()
    }

    /// Builds the plan for `snapshot`.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedIndex`] for a TTL index on `_ts`
    /// - [`Error::Colocation`] for missing anchors or cycles
    pub fn build(&self, snapshot: &SourceSnapshot) -> Result<TransformationPlan> {
        let selected: Vec<_> = self.selected(snapshot).collect();
        info!(
            listed = snapshot.len(),
            selected = selected.len(),
            "building transformation plan"
        );

        let mut entries = Vec::with_capacity(selected.len());
        for (source, config) in &selected {
            entries.push(self.plan_entry(source, config)?);
        }

        let resolved: Vec<ResolvedCollectionConfig> =
            selected.into_iter().map(|(_, config)| config).collect();
        let colocation = ColocationPlanner::new(snapshot).plan(&resolved);
        if !colocation.is_valid() {
            return Err(Error::Colocation(colocation.errors));
        }
        for entry in &mut entries {
            entry.colocate_with = colocation.anchor_of(&entry.id).cloned();
        }
        let scheduled: BTreeSet<_> = entries.iter().map(|e| e.id.clone()).collect();
        let dependencies = colocation.dependencies(&scheduled);

        let plan = TransformationPlan::new(entries, colocation.groups, dependencies);
        let summary = plan.summary();
        info!(
            collections = summary.collections,
            sharded = summary.sharded,
            indexes_kept = summary.indexes_kept,
            indexes_removed = summary.indexes_removed,
            warnings = summary.warnings,
            groups = summary.colocation_groups,
            "transformation plan ready"
        );
        Ok(plan)
    }

    fn selected<'s>(
        &'s self,
        snapshot: &'s SourceSnapshot,
    ) -> impl Iterator<Item = (&'s SourceCollection, ResolvedCollectionConfig)> + 's {
        snapshot.collections().filter_map(move |source| {
            let config = self.rules.resolve(&source.id);
            if config.is_none() {
                debug!(collection = %source.id, "not selected by any section");
            }
            config.map(|config| (source, config))
        })
    }

    fn plan_entry(
        &self,
        source: &SourceCollection,
        config: &ResolvedCollectionConfig,
    ) -> Result<PlanEntry> {
        if let Some(index) = source.indexes.iter().find(|index| index.is_ts_ttl()) {
            return Err(Error::UnsupportedIndex {
                collection: source.id.clone(),
                index: index.name.clone(),
                reason: format!(
                    "TTL on the system field '{TS_FIELD}' cannot be recreated; \
                     move the TTL to a document field before migrating"
                ),
            });
        }

        let options = &config.options;
        let resolution = self.shard_keys.resolve(source, options.migrate_shard_key);
        let mut warnings: Vec<_> = self
            .shard_keys
            .cardinality_warning(source, &resolution)
            .into_iter()
            .collect();

        let reduction = if options.optimize_compound_indexes {
            RedundancyAnalyzer::new(source.shard_key.as_ref()).reduce(&source.indexes)
        } else {
            Reduction::identity(&source.indexes)
        };
        warnings.extend(reduction.warnings);

        debug!(
            collection = %source.id,
            section = config.section,
            sharded = resolution.shard_key().is_some(),
            kept = reduction.kept.len(),
            removed = reduction.removed.len(),
            "collection planned"
        );
        for warning in &warnings {
            warn!(collection = %source.id, reason = warning.reason(), "{warning}");
        }

        Ok(PlanEntry {
            id: source.id.clone(),
            section: config.section,
            drop_if_exists: options.drop_if_exists,
            shard_key: resolution.into_shard_key(),
            indexes: reduction.kept,
            removed_indexes: reduction.removed,
            colocate_with: None,
            warnings,
        })
    }
}

/// Compiles `sections` and builds the plan for `snapshot`.
///
/// # Errors
///
/// See [`Orchestrator::new`] and [`Orchestrator::build`].
pub fn build(sections: &[SectionConfig], snapshot: &SourceSnapshot) -> Result<TransformationPlan> {
    Orchestrator::new(sections)?.build(snapshot)
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
