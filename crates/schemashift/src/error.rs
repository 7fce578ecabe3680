//! Error types for the schemashift tool.

use thiserror::Error;

/// Result type alias for tool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised outside the pure engine: loading files, talking to the
/// source catalog and executing target operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The transformation engine rejected the run.
    #[error(transparent)]
    Engine(#[from] schemashift_core::Error),

    /// Tool settings or the sections file could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The source catalog is unreachable or unreadable.
    #[error("Source connection error: {0}")]
    SourceConnection(String),

    /// The source returned metadata the tool cannot use.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// A target operation failed.
    #[error("Execution error on {operation}: {message}")]
    Execution {
        /// Operation that failed, as displayed in the plan.
        operation: String,
        /// Failure reported by the executor.
        message: String,
    },

    /// A failure expected to clear on its own (timeouts, throttling).
    #[error("Transient error: {0}")]
    Transient(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Stable code for the engine's errors, `None` for tool errors.
    #[must_use]
    pub fn engine_code(&self) -> Option<&'static str> {
        match self {
            Self::Engine(e) => Some(e.code()),
            _ => None,
        }
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<schemashift_core::ConfigError> for Error {
    fn from(err: schemashift_core::ConfigError) -> Self {
        Self::Engine(err.into())
    }
}
