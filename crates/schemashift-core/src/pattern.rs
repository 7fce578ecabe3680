//! Collection patterns and last-match-wins section resolution.
//!
//! Sections compile into an ordered list of rules. Resolving a collection
//! walks the rules from last to first and returns the options of the first
//! rule that selects it, so a later section fully replaces an earlier one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::config::{ResolvedCollectionConfig, SectionConfig, SectionOptions};
use crate::error::ConfigError;
use crate::model::CollectionId;

/// One include/exclude pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// `*`
    All,
    /// `db.*`
    Database(String),
    /// `db.coll`
    Collection(CollectionId),
}

impl Pattern {
    /// True if the pattern selects `id`.
    #[must_use]
    pub fn matches(&self, id: &CollectionId) -> bool {
        match self {
            Self::All => true,
            Self::Database(db) => *db == id.database,
            Self::Collection(exact) => exact == id,
        }
    }
}

impl FromStr for Pattern {
    type Err = ConfigError;

    fn from_str(pattern: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }
        if pattern.trim() != pattern {
            return Err(invalid("pattern has surrounding whitespace"));
        }
        if pattern == "*" {
            return Ok(Self::All);
        }

        let (database, collection) = pattern
            .split_once('.')
            .ok_or_else(|| invalid("expected '*', 'db.*' or 'db.collection'"))?;
        if database.is_empty() {
            return Err(invalid("database name is empty"));
        }
        if collection.is_empty() {
            return Err(invalid("collection name is empty"));
        }
        if database.contains('*') {
            return Err(invalid("wildcards are only supported as '*' or 'db.*'"));
        }
        if collection == "*" {
            return Ok(Self::Database(database.to_string()));
        }
        if collection.contains('*') {
            return Err(invalid("wildcards are only supported as '*' or 'db.*'"));
        }
        Ok(Self::Collection(CollectionId::new(database, collection)))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Database(db) => write!(f, "{db}.*"),
            Self::Collection(id) => id.fmt(f),
        }
    }
}

/// Include/exclude pair of one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl Selector {
    /// Parses both pattern lists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] for the first bad pattern.
    pub fn parse(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            include: parse_all(include)?,
            exclude: parse_all(exclude)?,
        })
    }

    /// Matched by an include pattern and by no exclude pattern.
    #[must_use]
    pub fn selects(&self, id: &CollectionId) -> bool {
        self.include.iter().any(|p| p.matches(id)) && !self.exclude.iter().any(|p| p.matches(id))
    }
}

fn parse_all(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns.iter().map(|p| p.parse()).collect()
}

/// A compiled section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    ordinal: usize,
    selector: Selector,
    options: SectionOptions,
}

/// Databases the source catalog must list for a rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseFilter {
    /// Every database.
    All,
    /// Only these databases.
    Only(BTreeSet<String>),
}

impl DatabaseFilter {
    /// True if collections of `database` must be listed.
    #[must_use]
    pub fn admits(&self, database: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.contains(database),
        }
    }
}

impl fmt::Display for DatabaseFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Only(names) => {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                f.write_str(&names.join(", "))
            }
        }
    }
}

/// Ordered rules compiled from the sections document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compiles sections in declared order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoSections`] for an empty list and
    /// [`ConfigError::InvalidPattern`] for the first unparsable pattern.
    pub fn compile(sections: &[SectionConfig]) -> Result<Self, ConfigError> {
        if sections.is_empty() {
            return Err(ConfigError::NoSections);
        }
        let rules = sections
            .iter()
            .enumerate()
            .map(|(ordinal, section)| {
                if section.include.is_empty() {
                    tracing::warn!(section = ordinal, "section has no include patterns and selects nothing");
                }
                Ok(Rule {
                    ordinal,
                    selector: Selector::parse(&section.include, &section.exclude)?,
                    options: section.options(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { rules })
    }

    /// Options for `id` from the last section that includes it, if any.
    #[must_use]
    pub fn resolve(&self, id: &CollectionId) -> Option<ResolvedCollectionConfig> {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.selector.selects(id))
            .map(|rule| ResolvedCollectionConfig {
                id: id.clone(),
                section: rule.ordinal,
                options: rule.options.clone(),
            })
    }

    /// Databases any include pattern can reach.
    #[must_use]
    pub fn database_filter(&self) -> DatabaseFilter {
        let mut names = BTreeSet::new();
        for pattern in self.rules.iter().flat_map(|r| r.selector.include.iter()) {
            match pattern {
                Pattern::All => return DatabaseFilter::All,
                Pattern::Database(db) => {
                    names.insert(db.clone());
                }
                Pattern::Collection(id) => {
                    names.insert(id.database.clone());
                }
            }
        }
        DatabaseFilter::Only(names)
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when the set holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Resolves one collection against raw sections.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the sections do not compile.
pub fn resolve(
    id: &CollectionId,
    sections: &[SectionConfig],
) -> Result<Option<ResolvedCollectionConfig>, ConfigError> {
    Ok(RuleSet::compile(sections)?.resolve(id))
}

#[cfg(test)]
#[path = "pattern_tests.rs"]
mod tests;
