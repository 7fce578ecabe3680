//! Error types for the transformation engine.
//!
//! Structural errors (configuration, colocation, unsupported indexes) abort a
//! run. Per-collection anomalies are never raised here: they are downgraded to
//! [`crate::plan::Warning`]s attached to the plan entry.

use thiserror::Error;

use crate::model::CollectionId;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading the sections document.
///
/// All of these are detected before any source metadata is consulted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The `sections` list is missing or empty.
    #[error("configuration must declare at least one section")]
    NoSections,

    /// A pattern is not one of `*`, `db.*` or `db.coll`.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern text.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An option was recognised but is no longer supported.
    #[error("unsupported option '{key}': {hint}")]
    UnsupportedOption {
        /// Option key as written in the document.
        key: String,
        /// Replacement to use instead.
        hint: String,
    },

    /// A value has the right key but an unusable value.
    #[error("invalid value for '{key}': {message}")]
    InvalidValue {
        /// Option key.
        key: String,
        /// Validation message.
        message: String,
    },

    /// The document could not be parsed at all (unknown keys included).
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Colocation failures. Any of these aborts the whole plan build.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColocationError {
    /// The anchor collection does not exist in the source database.
    #[error("'{collection}' is co-located with '{anchor}', which does not exist in the source")]
    MissingAnchor {
        /// Collection carrying `co_locate_with`.
        collection: CollectionId,
        /// The reference that could not be found.
        anchor: CollectionId,
    },

    /// Following `co_locate_with` references leads back to the start.
    #[error("co-location cycle: {}", render_cycle(.path))]
    Cycle {
        /// The cycle, starting and ending at the same collection.
        path: Vec<CollectionId>,
    },
}

fn render_cycle(path: &[CollectionId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn render_colocation(errors: &[ColocationError]) -> String {
    match errors {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

/// Errors that can occur while building a transformation plan.
///
/// Error codes follow the pattern `SHIFT-XXX`.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (SHIFT-001).
    #[error("[SHIFT-001] Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Colocation error (SHIFT-002).
    #[error("[SHIFT-002] Colocation error: {}", render_colocation(.0))]
    Colocation(Vec<ColocationError>),

    /// An index cannot be represented on the target (SHIFT-003).
    #[error("[SHIFT-003] Cannot migrate index '{index}' on {collection}: {reason}")]
    UnsupportedIndex {
        /// Owning collection.
        collection: CollectionId,
        /// Index name.
        index: String,
        /// Why the target rejects it.
        reason: String,
    },

    /// Source metadata is malformed (SHIFT-004).
    #[error("[SHIFT-004] Invalid source metadata: {0}")]
    InvalidMetadata(String),

    /// IO error (SHIFT-005).
    #[error("[SHIFT-005] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (SHIFT-006).
    #[error("[SHIFT-006] Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Returns the error code (e.g., "SHIFT-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "SHIFT-001",
            Self::Colocation(_) => "SHIFT-002",
            Self::UnsupportedIndex { .. } => "SHIFT-003",
            Self::InvalidMetadata(_) => "SHIFT-004",
            Self::Io(_) => "SHIFT-005",
            Self::Serialization(_) => "SHIFT-006",
        }
    }

    /// Returns true if the error was raised before any metadata was read.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
