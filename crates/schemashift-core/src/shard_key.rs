//! Target shard key decisions.
//!
//! A shard key is only ever carried over, never invented: an unsharded source
//! collection stays unsharded whatever the configuration says.

use serde::{Deserialize, Serialize};

use crate::model::{ShardKey, SourceCollection};
use crate::plan::Warning;

/// Distinct values below which a retained shard key is flagged.
pub const DEFAULT_LOW_CARDINALITY_THRESHOLD: u64 = 1000;

/// Shard key decision for one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardKeyResolution {
    /// Shard the target on this key.
    Sharded(ShardKey),
    /// Create the target unsharded.
    Unsharded,
}

impl ShardKeyResolution {
    /// The retained key, if any.
    #[must_use]
    pub fn shard_key(&self) -> Option<&ShardKey> {
        match self {
            Self::Sharded(key) => Some(key),
            Self::Unsharded => None,
        }
    }

    /// Consumes the resolution.
    #[must_use]
    pub fn into_shard_key(self) -> Option<ShardKey> {
        match self {
            Self::Sharded(key) => Some(key),
            Self::Unsharded => None,
        }
    }
}

/// Resolves shard keys and checks the retained ones against statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardKeyResolver {
    low_cardinality_threshold: u64,
}

impl Default for ShardKeyResolver {
    fn default() -> Self {
        Self {
            low_cardinality_threshold: DEFAULT_LOW_CARDINALITY_THRESHOLD,
        }
    }
}

impl ShardKeyResolver {
    /// Resolver flagging keys with fewer than `threshold` distinct values.
    #[must_use]
    pub const fn with_low_cardinality_threshold(threshold: u64) -> Self {
        Self {
            low_cardinality_threshold: threshold,
        }
    }

    /// Current threshold.
    #[must_use]
    pub const fn low_cardinality_threshold(&self) -> u64 {
        self.low_cardinality_threshold
    }

    /// Decides the target shard key.
    #[must_use]
    pub fn resolve(&self, source: &SourceCollection, migrate_shard_key: bool) -> ShardKeyResolution {
        match &source.shard_key {
            None => ShardKeyResolution::Unsharded,
            Some(_) if !migrate_shard_key => {
                tracing::debug!(collection = %source.id, "dropping source shard key");
                ShardKeyResolution::Unsharded
            }
            Some(key) => ShardKeyResolution::Sharded(key.clone()),
        }
    }

    /// Warning for a retained key with too few distinct values.
    ///
    /// Returns `None` unless both statistics are present.
    #[must_use]
    pub fn cardinality_warning(
        &self,
        source: &SourceCollection,
        resolution: &ShardKeyResolution,
    ) -> Option<Warning> {
        let key = resolution.shard_key()?;
        let stats = source.stats?;
        let distinct_values = stats.distinct_shard_key_values?;
        let document_count = stats.document_count?;
        let threshold = self.low_cardinality_threshold;
        (distinct_values < threshold && document_count > threshold).then(|| {
            Warning::LowCardinalityShardKey {
                field: key.field().to_string(),
                distinct_values,
                document_count,
            }
        })
    }
}

/// Decides the target shard key with the default resolver.
#[must_use]
pub fn resolve(source: &SourceCollection, migrate_shard_key: bool) -> ShardKeyResolution {
    ShardKeyResolver::default().resolve(source, migrate_shard_key)
}
