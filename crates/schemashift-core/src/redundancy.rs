//! Compound index redundancy analysis.
//!
//! An index `B` is redundant with respect to `A` when `B`'s key is a strict
//! prefix of `A`'s key (same fields, same directions, same order) and every
//! query `B` can serve, `A` can serve over the same documents. An exact
//! duplicate (same key, same options) of an earlier index is redundant too.
//!
//! Outside of exact duplicates, `B` is never removed when it is the `_id`
//! index, the shard key index, unique, sparse, partial or TTL, or when
//! another index shares its key with different options. `A` cannot
//! subsume anything when it skips documents (sparse, partial, text or geo
//! keys) or when its collation or remaining options differ from `B`'s.
//!
//! The relation is transitive, so every removed index has a kept subsumer
//! and reducing a reduced set changes nothing.

use serde::{Deserialize, Serialize};

use crate::model::{IndexDefinition, IndexKeySpec, IndexOptions, ShardKey};
use crate::plan::{RemovedIndex, Warning};

/// Options that only affect how the source built the index.
const BUILD_HINT_KEYS: &[&str] = &["background"];

/// Outcome of one reduction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reduction {
    /// Indexes to create, in input order.
    pub kept: Vec<IndexDefinition>,
    /// Indexes left out, in input order.
    pub removed: Vec<RemovedIndex>,
    /// One `redundant-prefix` warning per removal, then conflicts.
    pub warnings: Vec<Warning>,
}

impl Reduction {
    /// Keeps every index; used when optimisation is off.
    #[must_use]
    pub fn identity(indexes: &[IndexDefinition]) -> Self {
        Self {
            kept: indexes.to_vec(),
            ..Self::default()
        }
    }
}

/// Index redundancy analyzer for one collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedundancyAnalyzer<'a> {
    shard_key: Option<&'a ShardKey>,
}

impl<'a> RedundancyAnalyzer<'a> {
    /// Analyzer protecting the index that backs `shard_key`.
    #[must_use]
    pub fn new(shard_key: Option<&'a ShardKey>) -> Self {
        Self { shard_key }
    }

    /// Splits `indexes` into kept and removed.
    ///
    /// The result depends only on the input and its order.
    #[must_use]
    pub fn reduce(&self, indexes: &[IndexDefinition]) -> Reduction {
        let shard_key = self.shard_key.map(ShardKey::key_spec);
        let in_conflict = conflicted(indexes);
        let removable = |a: usize, b: usize| {
            subsumes(indexes, a, b, shard_key.as_ref())
                && (!in_conflict[b] || indexes[a].key == indexes[b].key)
        };
        let removed: Vec<bool> = (0..indexes.len())
            .map(|b| (0..indexes.len()).any(|a| removable(a, b)))
            .collect();

        let mut reduction = Reduction::default();
        for (b, index) in indexes.iter().enumerate() {
            if !removed[b] {
                reduction.kept.push(index.clone());
                continue;
            }
            let subsumer = (0..indexes.len())
                .find(|&a| !removed[a] && removable(a, b))
                .map_or_else(String::new, |a| indexes[a].name.clone());
            tracing::debug!(removed = %index.name, subsumed_by = %subsumer, "redundant index");
            reduction.warnings.push(Warning::RedundantIndex {
                removed_index: index.name.clone(),
                subsuming_index: subsumer.clone(),
            });
            reduction.removed.push(RemovedIndex {
                index: index.clone(),
                subsumed_by: subsumer,
            });
        }

        reduction.warnings.extend(conflicts(&reduction.kept));
        reduction
    }
}

/// Reduces an index set with no shard key to protect.
#[must_use]
pub fn reduce(indexes: &[IndexDefinition]) -> Reduction {
    RedundancyAnalyzer::default().reduce(indexes)
}

fn subsumes(
    indexes: &[IndexDefinition],
    a: usize,
    b: usize,
    shard_key: Option<&IndexKeySpec>,
) -> bool {
    if a == b {
        return false;
    }
    let (subsumer, candidate) = (&indexes[a], &indexes[b]);
    if candidate.is_id_index() {
        return false;
    }
    if candidate.key == subsumer.key {
        return a < b && same_options(&subsumer.options, &candidate.options);
    }
    covers_all_documents(subsumer)
        && candidate.key.is_strict_prefix_of(&subsumer.key)
        && is_plain(candidate, shard_key)
        && subsumer.options.collation == candidate.options.collation
        && same_extra(&subsumer.options, &candidate.options)
}

/// No option on the candidate that a wider index could not honour.
fn is_plain(index: &IndexDefinition, shard_key: Option<&IndexKeySpec>) -> bool {
    let options = &index.options;
    !options.unique
        && !options.restricts_coverage()
        && !options.has_ttl()
        && shard_key != Some(&index.key)
}

fn covers_all_documents(index: &IndexDefinition) -> bool {
    !index.options.restricts_coverage() && !index.key.is_implicitly_sparse()
}

fn same_options(a: &IndexOptions, b: &IndexOptions) -> bool {
    differing_options(a, b).is_empty()
}

fn same_extra(a: &IndexOptions, b: &IndexOptions) -> bool {
    let relevant = |o: &IndexOptions| {
        o.extra
            .iter()
            .filter(|(k, _)| !BUILD_HINT_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<Vec<_>>()
    };
    relevant(a) == relevant(b)
}

fn differing_options(a: &IndexOptions, b: &IndexOptions) -> Vec<String> {
    let mut differing = Vec::new();
    if a.unique != b.unique {
        differing.push("unique".to_string());
    }
    if a.sparse != b.sparse {
        differing.push("sparse".to_string());
    }
    if a.expire_after_seconds != b.expire_after_seconds {
        differing.push("expireAfterSeconds".to_string());
    }
    if a.partial_filter_expression != b.partial_filter_expression {
        differing.push("partialFilterExpression".to_string());
    }
    if a.collation != b.collation {
        differing.push("collation".to_string());
    }
    if !same_extra(a, b) {
        differing.push("other options".to_string());
    }
    differing
}

/// Indexes sharing their key with an index that has different options.
/// Both sides of such a pair stay, so the conflict is reported.
fn conflicted(indexes: &[IndexDefinition]) -> Vec<bool> {
    indexes
        .iter()
        .map(|b| {
            indexes
                .iter()
                .any(|a| a.key == b.key && !same_options(&a.options, &b.options))
        })
        .collect()
}

fn conflicts(kept: &[IndexDefinition]) -> Vec<Warning> {
    let mut warnings = Vec::new();
    for (i, first) in kept.iter().enumerate() {
        for second in &kept[i + 1..] {
            if first.key != second.key {
                continue;
            }
            let differing_options = differing_options(&first.options, &second.options);
            if !differing_options.is_empty() {
                warnings.push(Warning::RedundancyConflict {
                    first_index: first.name.clone(),
                    second_index: second.name.clone(),
                    differing_options,
                });
            }
        }
    }
    warnings
}

#[cfg(test)]
#[path = "redundancy_tests.rs"]
mod tests;
