//! # schemashift core
//!
//! Schema transformation engine for moving document-database collections
//! from an RU-based deployment to a vCore-based one.
//!
//! Given a source snapshot (indexes, shard keys, optional statistics) and an
//! ordered list of configuration sections, the engine produces a
//! [`TransformationPlan`]: per collection, whether to drop it first, which
//! shard key to keep, which indexes to create and which anchor to co-locate
//! it with, plus the order in which collections must be created.
//!
//! ## Components
//!
//! - **Pattern matcher** ([`pattern`]): `*`, `db.*` and `db.coll` patterns,
//!   last matching section wins.
//! - **Index redundancy analyzer** ([`redundancy`]): compound index prefix
//!   subsumption.
//! - **Shard key resolver** ([`shard_key`]): keep or drop the source key.
//! - **Colocation planner** ([`colocation`]): anchor groups, missing anchors
//!   and cycles.
//! - **Orchestrator** ([`orchestrator`]): one pass per collection.
//!
//! ## Quick Start
//!
//! ```rust
//! use schemashift_core::{
//!     build, CollectionId, IndexDefinition, IndexDirection, IndexKeySpec, SectionConfig,
//!     ShardKey, SourceCollection, SourceSnapshot,
//! };
//!
//! let snapshot = SourceSnapshot::from_collections([SourceCollection::new(
//!     CollectionId::new("shop", "orders"),
//! )
//! .with_shard_key(ShardKey::hashed("customerId"))
//! .with_indexes([
//!     IndexDefinition::from_key(IndexKeySpec::single("status", IndexDirection::Ascending)),
//!     IndexDefinition::from_key(IndexKeySpec::from_pairs([
//!         ("status", IndexDirection::Ascending),
//!         ("createdAt", IndexDirection::Descending),
//!     ])),
//! ])])?;
//!
//! let sections = vec![SectionConfig::including(["shop.*"])
//!     .migrate_shard_key(true)
//!     .optimize_compound_indexes(true)];
//!
//! let plan = build(&sections, &snapshot)?;
//! assert_eq!(plan.entries()[0].indexes.len(), 1);
//! # Ok::<(), schemashift_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod colocation;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod pattern;
pub mod plan;
pub mod redundancy;
pub mod shard_key;

pub use colocation::{ColocationGroup, ColocationPlan, ColocationPlanner};
pub use config::{ResolvedCollectionConfig, SectionConfig, SectionOptions, SectionsDocument};
pub use error::{ColocationError, ConfigError, Error, Result};
pub use model::{
    CollectionId, CollectionStats, IndexDefinition, IndexDirection, IndexField, IndexKeySpec,
    IndexOptions, ShardKey, ShardKeyKind, SourceCollection, SourceSnapshot,
};
pub use orchestrator::{build, Orchestrator};
pub use pattern::{DatabaseFilter, Pattern, RuleSet};
pub use plan::{
    Dependency, PlanEntry, PlanSummary, RemovedIndex, TargetOperation, TransformationPlan, Warning,
};
pub use redundancy::{RedundancyAnalyzer, Reduction};
pub use shard_key::{ShardKeyResolution, ShardKeyResolver, DEFAULT_LOW_CARDINALITY_THRESHOLD};
