//! Configuration loading for schemashift.
//!
//! Two files drive a run:
//!
//! - the **sections file** (JSON or YAML, picked by extension) that says
//!   which collections to migrate and how;
//! - the optional **settings file** (`schemashift.toml`) for tool behaviour.
//!
//! # Settings priority (highest to lowest)
//!
//! 1. Command-line flags
//! 2. Environment variables (`SCHEMASHIFT_*`, nested keys separated by `__`)
//! 3. Settings file
//! 4. Default values

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use schemashift_core::{SectionsDocument, DEFAULT_LOW_CARDINALITY_THRESHOLD};

use crate::error::{Error, Result};
use crate::retry::RetryConfig;

/// Default settings file name.
pub const DEFAULT_SETTINGS_FILE: &str = "schemashift.toml";

/// Loads and validates a sections file.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file is missing, has an unsupported
/// extension or does not parse, and an engine configuration error if it
/// parses but is invalid.
pub fn load_sections(path: &Path) -> Result<SectionsDocument> {
    if !path.is_file() {
        return Err(Error::Config(format!(
            "sections file '{}' not found",
            path.display()
        )));
    }
    let figment = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Figment::from(Json::file(path)),
        Some("yaml" | "yml") => Figment::from(Yaml::file(path)),
        _ => {
            return Err(Error::Config(format!(
                "sections file '{}' must end in .json, .yaml or .yml",
                path.display()
            )))
        }
    };
    let document: SectionsDocument = figment.extract()?;
    document.validate()?;
    Ok(document)
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive (`info`, `schemashift=debug`, ...).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Retry settings for source and target calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on any delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            ..Self::default()
        }
    }
}

/// Tool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Logging.
    pub logging: LoggingSettings,
    /// Concurrent metadata fetches during discovery.
    pub workers: usize,
    /// Retry policy.
    pub retry: RetrySettings,
    /// Distinct shard key values below which a retained key is flagged.
    pub low_cardinality_threshold: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            logging: LoggingSettings::default(),
            workers: 4,
            retry: RetrySettings::default(),
            low_cardinality_threshold: DEFAULT_LOW_CARDINALITY_THRESHOLD,
        }
    }
}

impl ToolSettings {
    /// Loads settings from `path` (optional) and the environment.
    ///
    /// A missing file is not an error: defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a value has the wrong type or fails
    /// validation.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SCHEMASHIFT_").split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from the default file in the working directory.
    ///
    /// # Errors
    ///
    /// See [`Self::load_from_path`].
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_SETTINGS_FILE)
    }

    /// Parses settings from a TOML string, without the environment.
    ///
    /// # Errors
    ///
    /// See [`Self::load_from_path`].
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let settings: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first bad key.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("'workers' must be at least 1".to_string()));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(Error::Config(format!(
                "'retry.initial_delay_ms' ({}) exceeds 'retry.max_delay_ms' ({})",
                self.retry.initial_delay_ms, self.retry.max_delay_ms
            )));
        }
        Ok(())
    }

    /// Retry policy for collaborator calls.
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::from(&self.retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().expect("temp file");
        file.write_all(content.as_bytes()).expect("write");
        file
    }

    #[test]
    fn test_load_json_sections() {
        // Arrange
        let file = write_temp(
            ".json",
            r#"{"sections": [
                {"include": ["*"], "exclude": ["db1.*"]},
                {"include": ["db1.coll1"], "migrate_shard_key": "true"}
            ]}"#,
        );

        // Act
        let document = load_sections(file.path()).expect("load");

        // Assert
        assert_eq!(document.sections.len(), 2);
        assert_eq!(document.sections[0].exclude, vec!["db1.*"]);
        assert!(document.sections[1].migrate_shard_key);
    }

    #[test]
    fn test_load_yaml_sections() {
        let file = write_temp(
            ".yaml",
            "sections:\n  - include: [\"shop.*\"]\n    co_locate_with: customers\n    drop_if_exists: true\n",
        );

        let document = load_sections(file.path()).expect("load");

        assert_eq!(document.sections[0].co_locate_with.as_deref(), Some("customers"));
        assert!(document.sections[0].drop_if_exists);
    }

    #[test]
    fn test_sections_errors() {
        let empty = write_temp(".json", r#"{"sections": []}"#);
        let legacy = write_temp(".json", r#"{"sections": [{"include": ["*"], "unsharded": true}]}"#);
        let text = write_temp(".txt", "");

        assert_eq!(
            load_sections(empty.path()).expect_err("empty").engine_code(),
            Some("SHIFT-001")
        );
        assert!(load_sections(legacy.path())
            .expect_err("legacy")
            .to_string()
            .contains("migrate_shard_key"));
        assert!(matches!(load_sections(text.path()), Err(Error::Config(_))));
        assert!(matches!(
            load_sections(Path::new("/nonexistent/sections.json")),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_settings_defaults() {
        let settings = ToolSettings::from_toml("").expect("defaults");

        assert_eq!(settings, ToolSettings::default());
        assert_eq!(settings.low_cardinality_threshold, 1000);
        assert_eq!(settings.retry_config().max_retries, 3);
    }

    #[test]
    fn test_settings_from_toml() {
        let settings = ToolSettings::from_toml(
            r#"
            workers = 16
            low_cardinality_threshold = 50

            [logging]
            level = "debug"
            format = "json"

            [retry]
            max_retries = 0
            "#,
        )
        .expect("parse");

        assert_eq!(settings.workers, 16);
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.retry.max_retries, 0);
        assert_eq!(settings.retry.initial_delay_ms, 500);
    }

    #[test]
    fn test_settings_validation() {
        assert!(ToolSettings::from_toml("workers = 0").is_err());
        assert!(ToolSettings::from_toml(
            "[retry]\ninitial_delay_ms = 5000\nmax_delay_ms = 100"
        )
        .is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_SETTINGS_FILE, "workers = 2\n[logging]\nlevel = \"warn\"")?;
            jail.set_env("SCHEMASHIFT_WORKERS", "8");
            jail.set_env("SCHEMASHIFT_LOGGING__LEVEL", "debug");

            let settings = ToolSettings::load().map_err(|e| e.to_string())?;

            assert_eq!(settings.workers, 8);
            assert_eq!(settings.logging.level, "debug");
            Ok(())
        });
    }
}
