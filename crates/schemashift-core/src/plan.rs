//! The transformation plan handed to the target executor.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::colocation::ColocationGroup;
use crate::model::{CollectionId, IndexDefinition, ShardKey};

/// Non-fatal diagnostic attached to a plan entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum Warning {
    /// An index was dropped because another index's key starts with it.
    #[serde(rename = "redundant-prefix")]
    RedundantIndex {
        /// Removed index name.
        removed_index: String,
        /// Kept index that serves the same queries.
        subsuming_index: String,
    },
    /// Two indexes share a key but disagree on options; both are kept.
    RedundancyConflict {
        /// Index declared first.
        first_index: String,
        /// Index declared second.
        second_index: String,
        /// Options that differ.
        differing_options: Vec<String>,
    },
    /// The retained shard key has few distinct values.
    LowCardinalityShardKey {
        /// Shard key field.
        field: String,
        /// Distinct values reported by the catalog.
        distinct_values: u64,
        /// Documents reported by the catalog.
        document_count: u64,
    },
}

impl Warning {
    /// Machine-readable reason tag.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::RedundantIndex { .. } => "redundant-prefix",
            Self::RedundancyConflict { .. } => "redundancy-conflict",
            Self::LowCardinalityShardKey { .. } => "low-cardinality-shard-key",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RedundantIndex {
                removed_index,
                subsuming_index,
            } => write!(
                f,
                "index '{removed_index}' removed: its key is a prefix of '{subsuming_index}'"
            ),
            Self::RedundancyConflict {
                first_index,
                second_index,
                differing_options,
            } => write!(
                f,
                "indexes '{first_index}' and '{second_index}' share a key but differ in {}; both kept",
                differing_options.join(", ")
            ),
            Self::LowCardinalityShardKey {
                field,
                distinct_values,
                document_count,
            } => write!(
                f,
                "shard key '{field}' has {distinct_values} distinct values over {document_count} documents; consider a higher-cardinality key"
            ),
        }
    }
}

/// A source index the analyzer left out of the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedIndex {
    /// The removed definition.
    pub index: IndexDefinition,
    /// Name of the kept index that covers it.
    pub subsumed_by: String,
}

/// Everything the target needs to recreate one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Collection.
    pub id: CollectionId,
    /// Zero-based index of the section that selected the collection.
    pub section: usize,
    /// Drop the target collection first.
    pub drop_if_exists: bool,
    /// Target shard key; `None` means unsharded.
    pub shard_key: Option<ShardKey>,
    /// Indexes to create, in source order.
    pub indexes: Vec<IndexDefinition>,
    /// Indexes left out by the redundancy analyzer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_indexes: Vec<RemovedIndex>,
    /// Anchor collection for placement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colocate_with: Option<CollectionId>,
    /// Diagnostics.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl PlanEntry {
    /// Target operations for this entry, in execution order.
    ///
    /// The implicit `_id` index is created with the collection and is not
    /// listed.
    #[must_use]
    pub fn operations(&self) -> Vec<TargetOperation> {
        let mut ops = Vec::with_capacity(self.indexes.len() + 3);
        if self.drop_if_exists {
            ops.push(TargetOperation::DropCollection {
                collection: self.id.clone(),
            });
        }
        ops.push(TargetOperation::CreateCollection {
            collection: self.id.clone(),
            colocate_with: self.colocate_with.clone(),
        });
        if let Some(key) = &self.shard_key {
            ops.push(TargetOperation::ShardCollection {
                collection: self.id.clone(),
                key: key.clone(),
            });
        }
        ops.extend(
            self.indexes
                .iter()
                .filter(|index| !index.is_id_index())
                .map(|index| TargetOperation::CreateIndex {
                    collection: self.id.clone(),
                    index: index.clone(),
                }),
        );
        ops
    }
}

/// One step for the target executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TargetOperation {
    /// Drop the collection if it exists.
    DropCollection {
        /// Collection.
        collection: CollectionId,
    },
    /// Create the collection if it does not exist.
    CreateCollection {
        /// Collection.
        collection: CollectionId,
        /// Placement hint.
        colocate_with: Option<CollectionId>,
    },
    /// Shard the collection.
    ShardCollection {
        /// Collection.
        collection: CollectionId,
        /// Shard key.
        key: ShardKey,
    },
    /// Create one index.
    CreateIndex {
        /// Collection.
        collection: CollectionId,
        /// Index.
        index: IndexDefinition,
    },
}

impl TargetOperation {
    /// Collection the operation applies to.
    #[must_use]
    pub fn collection(&self) -> &CollectionId {
        match self {
            Self::DropCollection { collection }
            | Self::CreateCollection { collection, .. }
            | Self::ShardCollection { collection, .. }
            | Self::CreateIndex { collection, .. } => collection,
        }
    }
}

impl fmt::Display for TargetOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DropCollection { collection } => write!(f, "drop {collection}"),
            Self::CreateCollection {
                collection,
                colocate_with: Some(anchor),
            } => write!(f, "create {collection} (co-located with {anchor})"),
            Self::CreateCollection { collection, .. } => write!(f, "create {collection}"),
            Self::ShardCollection { collection, key } => write!(f, "shard {collection} on {key}"),
            Self::CreateIndex { collection, index } => {
                write!(f, "index {collection} '{}' {}", index.name, index.key)
            }
        }
    }
}

/// `before` must exist on the target before `after` is created.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dependency {
    /// Created first.
    pub before: CollectionId,
    /// Created second.
    pub after: CollectionId,
}

/// Plan totals for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    /// Collections in the plan.
    pub collections: usize,
    /// Collections sharded on the target.
    pub sharded: usize,
    /// Collections dropped before creation.
    pub dropped: usize,
    /// Indexes to create.
    pub indexes_kept: usize,
    /// Indexes removed as redundant.
    pub indexes_removed: usize,
    /// Warnings across all entries.
    pub warnings: usize,
    /// Colocation groups.
    pub colocation_groups: usize,
}

/// Ordered per-collection plan plus placement groups and ordering
/// constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationPlan {
    entries: Vec<PlanEntry>,
    groups: Vec<ColocationGroup>,
    dependencies: Vec<Dependency>,
}

impl TransformationPlan {
    pub(crate) fn new(
        entries: Vec<PlanEntry>,
        groups: Vec<ColocationGroup>,
        dependencies: Vec<Dependency>,
    ) -> Self {
        Self {
            entries,
            groups,
            dependencies,
        }
    }

    /// Entries in `(database, collection)` order.
    #[must_use]
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Entry for `id`.
    #[must_use]
    pub fn get(&self, id: &CollectionId) -> Option<&PlanEntry> {
        self.entries
            .binary_search_by(|entry| entry.id.cmp(id))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Colocation groups, ordered by anchor.
    #[must_use]
    pub fn groups(&self) -> &[ColocationGroup] {
        &self.groups
    }

    /// Ordering constraints between entries.
    #[must_use]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no collection was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every warning with its collection.
    pub fn warnings(&self) -> impl Iterator<Item = (&CollectionId, &Warning)> {
        self.entries
            .iter()
            .flat_map(|entry| entry.warnings.iter().map(move |w| (&entry.id, w)))
    }

    /// Entries in an order that honours every [`Dependency`].
    ///
    /// Among entries whose dependencies are satisfied, the smallest
    /// identity goes first, so the order is stable across runs.
    #[must_use]
    pub fn execution_order(&self) -> Vec<&PlanEntry> {
        let mut pending: BTreeMap<&CollectionId, usize> =
            self.entries.iter().map(|e| (&e.id, 0)).collect();
        let mut successors: BTreeMap<&CollectionId, Vec<&CollectionId>> = BTreeMap::new();
        for dep in &self.dependencies {
            if !pending.contains_key(&dep.before) {
                continue;
            }
            if let Some(count) = pending.get_mut(&dep.after) {
                *count += 1;
                successors.entry(&dep.before).or_default().push(&dep.after);
            }
        }

        let mut ready: BTreeSet<&CollectionId> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.entries.len());
        while let Some(id) = ready.pop_first() {
            pending.remove(id);
            if let Some(entry) = self.get(id) {
                order.push(entry);
            }
            for next in successors.get(id).into_iter().flatten() {
                if let Some(count) = pending.get_mut(*next) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*next);
                    }
                }
            }
        }

        // Colocation validation rejects cycles, so this only runs on a
        // hand-built plan.
        order.extend(pending.keys().filter_map(|id| self.get(id)));
        order
    }

    /// Totals for reporting.
    #[must_use]
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            collections: self.entries.len(),
            sharded: self.entries.iter().filter(|e| e.shard_key.is_some()).count(),
            dropped: self.entries.iter().filter(|e| e.drop_if_exists).count(),
            indexes_kept: self.entries.iter().map(|e| e.indexes.len()).sum(),
            indexes_removed: self.entries.iter().map(|e| e.removed_indexes.len()).sum(),
            warnings: self.entries.iter().map(|e| e.warnings.len()).sum(),
            colocation_groups: self.groups.len(),
        }
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
