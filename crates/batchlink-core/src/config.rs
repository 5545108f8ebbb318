//! Configuration module for Batchlink.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::IdentifierFormat;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Batchlink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub matching: MatchingConfig,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Backend service endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the record, query, token and session services.
    pub base_url: String,
    /// Base URL of the asset store.
    pub asset_url: String,
    /// Bearer token sent with every request, if the backend needs one.
    pub api_token: Option<String>,
}

/// Record matching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Table holding the records files are attached to.
    pub base_table: String,
    /// Field of `base_table` compared against file-name identifiers.
    pub match_field: String,
    /// Identifier format: `text` or `numeric`.
    pub identifier_format: String,
    /// Zero-padded width for the `numeric` format.
    pub numeric_width: usize,
    /// Extra fields shown to the user when disambiguating.
    pub display_fields: Vec<String>,
    /// Table holding attachment sub-records.
    pub attachment_table: String,
    /// Field of `attachment_table` holding the asset location.
    pub attachment_location_field: String,
    /// Field of `attachment_table` holding the attachment id.
    pub attachment_id_field: String,
    /// Field of `attachment_table` referencing the owning base record.
    pub attachment_owner_field: String,
}

/// Work loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Retry requests tolerated per item before the batch stops.
    pub retry_budget: u32,
    /// Seconds to wait before retrying an item.
    pub backoff_secs: u64,
    /// Milliseconds between countdown ticks.
    pub tick_millis: u64,
}

/// Local storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the SQLite session database.
    pub database: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/batchlink/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("batchlink")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            asset_url: "http://localhost:8080/assets".to_string(),
            api_token: None,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            base_table: "collectionobject".to_string(),
            match_field: "catalogNumber".to_string(),
            identifier_format: "text".to_string(),
            numeric_width: 9,
            display_fields: Vec::new(),
            attachment_table: "attachment".to_string(),
            attachment_location_field: "location".to_string(),
            attachment_id_field: "id".to_string(),
            attachment_owner_field: "recordId".to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retry_budget: 2,
            backoff_secs: 12,
            tick_millis: 1000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("batchlink");
        Self {
            database: data_dir.join("sessions.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Typed accessors
// ---------------------------------------------------------------------------

impl MatchingConfig {
    /// The configured identifier format.
    ///
    /// Unknown format names fall back to `text`; [`Config::validate`]
    /// reports them.
    pub fn identifier_format(&self) -> IdentifierFormat {
        match self.identifier_format.as_str() {
            "numeric" => IdentifierFormat::Numeric {
                width: self.numeric_width,
            },
            _ => IdentifierFormat::Text,
        }
    }
}

impl SchedulerConfig {
    /// Backoff before an item is retried.
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    /// Interval between countdown ticks.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"scheduler.retry_budget"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `matching.identifier_format`.
const VALID_IDENTIFIER_FORMATS: &[&str] = &["text", "numeric"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- backend ---
        for (field, url) in [
            ("backend.base_url", &self.backend.base_url),
            ("backend.asset_url", &self.backend.asset_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("must be an http(s) URL, got '{url}'"),
                });
            }
        }

        // --- matching ---
        for (field, value) in [
            ("matching.base_table", &self.matching.base_table),
            ("matching.match_field", &self.matching.match_field),
            ("matching.attachment_table", &self.matching.attachment_table),
            (
                "matching.attachment_location_field",
                &self.matching.attachment_location_field,
            ),
            (
                "matching.attachment_id_field",
                &self.matching.attachment_id_field,
            ),
            (
                "matching.attachment_owner_field",
                &self.matching.attachment_owner_field,
            ),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must not be empty".into(),
                });
            }
        }
        if !VALID_IDENTIFIER_FORMATS.contains(&self.matching.identifier_format.as_str()) {
            errors.push(ValidationError {
                field: "matching.identifier_format".into(),
                message: format!(
                    "invalid format '{}', expected one of: {}",
                    self.matching.identifier_format,
                    VALID_IDENTIFIER_FORMATS.join(", ")
                ),
            });
        }
        if self.matching.identifier_format == "numeric" && self.matching.numeric_width == 0 {
            errors.push(ValidationError {
                field: "matching.numeric_width".into(),
                message: "must be greater than 0 for the numeric format".into(),
            });
        }

        // --- scheduler ---
        if self.scheduler.retry_budget == 0 {
            errors.push(ValidationError {
                field: "scheduler.retry_budget".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.scheduler.tick_millis == 0 {
            errors.push(ValidationError {
                field: "scheduler.tick_millis".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- storage ---
        if self.storage.database.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.database".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for programmatic construction of a [`Config`].
///
/// Starts from [`Config::default`] and overrides individual fields.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a builder pre-populated with default values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- backend ---

    pub fn backend_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.backend.base_url = url.into();
        self
    }

    pub fn backend_asset_url(mut self, url: impl Into<String>) -> Self {
        self.config.backend.asset_url = url.into();
        self
    }

    pub fn backend_api_token(mut self, token: impl Into<String>) -> Self {
        self.config.backend.api_token = Some(token.into());
        self
    }

    // --- matching ---

    pub fn matching_base_table(mut self, table: impl Into<String>) -> Self {
        self.config.matching.base_table = table.into();
        self
    }

    pub fn matching_match_field(mut self, field: impl Into<String>) -> Self {
        self.config.matching.match_field = field.into();
        self
    }

    pub fn matching_identifier_format(mut self, format: impl Into<String>) -> Self {
        self.config.matching.identifier_format = format.into();
        self
    }

    pub fn matching_numeric_width(mut self, width: usize) -> Self {
        self.config.matching.numeric_width = width;
        self
    }

    pub fn matching_display_fields(mut self, fields: Vec<String>) -> Self {
        self.config.matching.display_fields = fields;
        self
    }

    pub fn matching_attachment_table(mut self, table: impl Into<String>) -> Self {
        self.config.matching.attachment_table = table.into();
        self
    }

    // --- scheduler ---

    pub fn scheduler_retry_budget(mut self, budget: u32) -> Self {
        self.config.scheduler.retry_budget = budget;
        self
    }

    pub fn scheduler_backoff_secs(mut self, secs: u64) -> Self {
        self.config.scheduler.backoff_secs = secs;
        self
    }

    pub fn scheduler_tick_millis(mut self, millis: u64) -> Self {
        self.config.scheduler.tick_millis = millis;
        self
    }

    // --- storage ---

    pub fn storage_database(mut self, path: PathBuf) -> Self {
        self.config.storage.database = path;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
