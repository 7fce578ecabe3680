//! Sections document: which collections to migrate and how.
//!
//! ```json
//! {
//!   "sections": [
//!     { "include": ["*"], "exclude": ["db1.*"], "migrate_shard_key": "false" },
//!     { "include": ["db1.coll1"], "migrate_shard_key": true, "co_locate_with": "anchor" }
//!   ]
//! }
//! ```
//!
//! Booleans may be written as JSON booleans or as `"true"` / `"false"`
//! strings. The shard key option is `migrate_shard_key` (default `false`);
//! the older, inverted `unsharded` key is rejected.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::CollectionId;
use crate::pattern::RuleSet;

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionsDocument {
    /// Sections, evaluated in order. Later matches win.
    #[serde(default)]
    pub sections: Vec<SectionConfig>,
}

impl SectionsDocument {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON, unknown keys or bad
    /// values, and any error reported by [`Self::validate`].
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let document: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        document.validate()?;
        Ok(document)
    }

    /// Checks that the document declares sections and that every pattern
    /// parses.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        RuleSet::compile(&self.sections).map(|_| ())
    }
}

/// Effective per-collection options of one section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionOptions {
    /// Keep the source shard key on the target.
    pub migrate_shard_key: bool,
    /// Drop the target collection before recreating it.
    pub drop_if_exists: bool,
    /// Remove prefix-redundant indexes.
    pub optimize_compound_indexes: bool,
    /// Anchor collection in the same database.
    pub co_locate_with: Option<String>,
}

/// One configuration section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSection")]
pub struct SectionConfig {
    /// Include patterns (`*`, `db.*`, `db.coll`).
    pub include: Vec<String>,
    /// Exclude patterns, same grammar.
    pub exclude: Vec<String>,
    /// See [`SectionOptions::migrate_shard_key`].
    pub migrate_shard_key: bool,
    /// See [`SectionOptions::drop_if_exists`].
    pub drop_if_exists: bool,
    /// See [`SectionOptions::optimize_compound_indexes`].
    pub optimize_compound_indexes: bool,
    /// See [`SectionOptions::co_locate_with`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co_locate_with: Option<String>,
}

impl SectionConfig {
    /// Section including `patterns`, all options at their defaults.
    pub fn including<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: patterns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Adds exclude patterns.
    #[must_use]
    pub fn excluding<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Sets `migrate_shard_key`.
    #[must_use]
    pub fn migrate_shard_key(mut self, value: bool) -> Self {
        self.migrate_shard_key = value;
        self
    }

    /// Sets `drop_if_exists`.
    #[must_use]
    pub fn drop_if_exists(mut self, value: bool) -> Self {
        self.drop_if_exists = value;
        self
    }

    /// Sets `optimize_compound_indexes`.
    #[must_use]
    pub fn optimize_compound_indexes(mut self, value: bool) -> Self {
        self.optimize_compound_indexes = value;
        self
    }

    /// Sets `co_locate_with`.
    #[must_use]
    pub fn co_locate_with(mut self, anchor: impl Into<String>) -> Self {
        self.co_locate_with = Some(anchor.into());
        self
    }

    /// The section's options, without its patterns.
    #[must_use]
    pub fn options(&self) -> SectionOptions {
        SectionOptions {
            migrate_shard_key: self.migrate_shard_key,
            drop_if_exists: self.drop_if_exists,
            optimize_compound_indexes: self.optimize_compound_indexes,
            co_locate_with: self.co_locate_with.clone(),
        }
    }
}

/// Options in effect for one collection after last-match-wins resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCollectionConfig {
    /// Collection.
    pub id: CollectionId,
    /// Zero-based index of the winning section.
    pub section: usize,
    /// Options of that section.
    pub options: SectionOptions,
}

impl ResolvedCollectionConfig {
    /// The anchor this collection co-locates with, in its own database.
    #[must_use]
    pub fn anchor(&self) -> Option<CollectionId> {
        self.options
            .co_locate_with
            .as_deref()
            .map(|name| self.id.sibling(name))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

fn flag(key: &str, value: Option<Flag>) -> Result<bool, ConfigError> {
    match value {
        None => Ok(false),
        Some(Flag::Bool(b)) => Ok(b),
        Some(Flag::Text(text)) => match text.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected true or false, got '{text}'"),
            }),
        },
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSection {
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    exclude: Vec<String>,
    migrate_shard_key: Option<Flag>,
    drop_if_exists: Option<Flag>,
    optimize_compound_indexes: Option<Flag>,
    co_locate_with: Option<String>,
    unsharded: Option<Flag>,
}

impl TryFrom<RawSection> for SectionConfig {
    type Error = ConfigError;

    fn try_from(raw: RawSection) -> Result<Self, Self::Error> {
        if raw.unsharded.is_some() {
            return Err(ConfigError::UnsupportedOption {
                key: "unsharded".to_string(),
                hint: "use 'migrate_shard_key' (inverted: unsharded=false is migrate_shard_key=true)"
                    .to_string(),
            });
        }
        let co_locate_with = match raw.co_locate_with {
            Some(name) if name.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    key: "co_locate_with".to_string(),
                    message: "anchor collection name is empty".to_string(),
                });
            }
            other => other,
        };
        Ok(Self {
            include: raw.include,
            exclude: raw.exclude,
            migrate_shard_key: flag("migrate_shard_key", raw.migrate_shard_key)?,
            drop_if_exists: flag("drop_if_exists", raw.drop_if_exists)?,
            optimize_compound_indexes: flag(
                "optimize_compound_indexes",
                raw.optimize_compound_indexes,
            )?,
            co_locate_with,
        })
    }
}
