// crates/orchestrator-config/src/config.rs
// ============================================================================
// Module: Brand Orchestrator Configuration
// Description: Configuration loading and validation for the orchestrator.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: orchestrator-core, orchestrator-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every field has a default, so an empty file is a valid configuration.
//! Values that would only fail later (an empty store path, a zero busy
//! timeout, a zero telemetry capacity) are rejected at load time.
//!
//! The run settings snapshot is built once when the configuration is
//! constructed and never changes afterwards.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use orchestrator_core::DEFAULT_MAX_METRICS;
use orchestrator_core::TelemetryStore;
use orchestrator_store_sqlite::SqliteStoreConfig;
use orchestrator_store_sqlite::SqliteStoreMode;
use orchestrator_store_sqlite::SqliteSyncMode;
use orchestrator_store_sqlite::config::DEFAULT_BUSY_TIMEOUT_MS;
use orchestrator_store_sqlite::config::MAX_BUSY_TIMEOUT_MS;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "brand-orchestrator.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "BRAND_ORCHESTRATOR_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default database location.
const DEFAULT_STORE_PATH: &str = "./data/brand_orchestrator.sqlite";
/// Default artifacts directory.
const DEFAULT_ARTIFACTS_DIR: &str = "./artifacts";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Validated orchestrator configuration.
///
/// # Invariants
/// - Constructed only through validation; every field is usable as is.
/// - `settings_snapshot` reflects the other fields and is never recomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// `SQLite` state store settings.
    store: SqliteStoreConfig,
    /// Telemetry registry settings.
    telemetry: TelemetryConfig,
    /// Directory for run artifacts.
    artifacts_dir: PathBuf,
    /// Log verbosity.
    log_level: LogLevel,
    /// Stable-key JSON view passed to `start_run`.
    settings_snapshot: Value,
}

impl OrchestratorConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: `path`, then [`CONFIG_ENV_VAR`], then
    /// `brand-orchestrator.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for values that fail validation.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        Self::from_file(file)
    }

    /// Returns the store settings.
    #[must_use]
    pub const fn store(&self) -> &SqliteStoreConfig {
        &self.store
    }

    /// Returns the telemetry settings.
    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryConfig {
        &self.telemetry
    }

    /// Returns the artifacts directory.
    #[must_use]
    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    /// Returns the log verbosity.
    #[must_use]
    pub const fn log_level(&self) -> LogLevel {
        self.log_level
    }

    /// Returns the settings snapshot recorded with each run.
    #[must_use]
    pub const fn settings_snapshot(&self) -> &Value {
        &self.settings_snapshot
    }

    /// Creates the artifacts directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the directory cannot be created.
    pub fn ensure_artifacts_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.artifacts_dir).map_err(|err| ConfigError::Io(err.to_string()))
    }

    /// Validates the parsed file and builds the immutable configuration.
    fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        file.store.validate()?;
        file.telemetry.validate()?;
        validate_path_string("artifacts_dir", &file.artifacts_dir)?;
        let log_level = LogLevel::parse(&file.log_level).ok_or_else(|| {
            ConfigError::Invalid(format!("unknown log_level: {}", file.log_level.trim()))
        })?;
        let store = SqliteStoreConfig {
            path: PathBuf::from(file.store.path.trim()),
            busy_timeout_ms: file.store.busy_timeout_ms,
            journal_mode: file.store.journal_mode,
            sync_mode: file.store.sync_mode,
        };
        let artifacts_dir = PathBuf::from(file.artifacts_dir.trim());
        let settings_snapshot =
            build_settings_snapshot(&store, &file.telemetry, &artifacts_dir, log_level);
        Ok(Self {
            store,
            telemetry: file.telemetry,
            artifacts_dir,
            log_level,
            settings_snapshot,
        })
    }
}

/// Telemetry registry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TelemetryConfig {
    /// Maximum number of distinct metric names retained.
    #[serde(default = "default_max_metrics")]
    pub max_metrics: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            max_metrics: default_max_metrics(),
        }
    }
}

impl TelemetryConfig {
    /// Builds an empty registry with the configured capacity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the capacity is zero.
    pub fn build_store(&self) -> Result<TelemetryStore, ConfigError> {
        TelemetryStore::with_capacity(self.max_metrics)
            .map_err(|err| ConfigError::Invalid(format!("telemetry: {err}")))
    }

    /// Validates telemetry configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_metrics == 0 {
            return Err(ConfigError::Invalid(
                "telemetry max_metrics must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Log verbosity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Debug detail.
    Debug,
    /// Normal operation.
    #[default]
    Info,
    /// Recoverable problems.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Parses a level name, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Returns the canonical lowercase name, usable as a log filter directive.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

// ============================================================================
// SECTION: File Model
// ============================================================================

/// Configuration file as written on disk.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    /// `[store]` section.
    #[serde(default)]
    store: StoreSection,
    /// `[telemetry]` section.
    #[serde(default)]
    telemetry: TelemetryConfig,
    /// Artifacts directory.
    #[serde(default = "default_artifacts_dir")]
    artifacts_dir: String,
    /// Log verbosity name.
    #[serde(default = "default_log_level")]
    log_level: String,
}

/// `[store]` section as written on disk.
#[derive(Debug, Deserialize)]
struct StoreSection {
    /// Database file path.
    #[serde(default = "default_store_path")]
    path: String,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    sync_mode: SqliteSyncMode,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreSection {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("store.path", &self.path)?;
        if self.path.trim() == ":memory:" {
            return Err(ConfigError::Invalid("store.path must name a file".to_string()));
        }
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "store busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "store busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the stable-key settings snapshot.
fn build_settings_snapshot(
    store: &SqliteStoreConfig,
    telemetry: &TelemetryConfig,
    artifacts_dir: &Path,
    log_level: LogLevel,
) -> Value {
    json!({
        "artifacts_dir": artifacts_dir.display().to_string(),
        "log_level": log_level.as_str(),
        "store": {
            "path": store.path.display().to_string(),
            "busy_timeout_ms": store.busy_timeout_ms,
            "journal_mode": store.journal_mode.pragma_value(),
            "sync_mode": store.sync_mode.pragma_value(),
        },
        "telemetry": {
            "max_metrics": telemetry.max_metrics,
        },
    })
}

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Default database path.
fn default_store_path() -> String {
    DEFAULT_STORE_PATH.to_string()
}

/// Default artifacts directory.
fn default_artifacts_dir() -> String {
    DEFAULT_ARTIFACTS_DIR.to_string()
}

/// Default log level name.
fn default_log_level() -> String {
    LogLevel::default().as_str().to_string()
}

/// Default busy timeout in milliseconds.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Default telemetry capacity.
const fn default_max_metrics() -> usize {
    DEFAULT_MAX_METRICS
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[test]
    fn validate_path_string_rejects_whitespace_only() {
        let result = validate_path_string("store.path", "   ");
        assert!(result.unwrap_err().to_string().contains("non-empty"));
    }

    #[test]
    fn validate_path_string_rejects_component_too_long() {
        let path = format!("./{}", "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1));
        let result = validate_path_string("artifacts_dir", &path);
        assert!(result.unwrap_err().to_string().contains("component too long"));
    }

    #[test]
    fn validate_path_string_accepts_component_at_max() {
        let path = format!("./{}", "a".repeat(MAX_PATH_COMPONENT_LENGTH));
        assert!(validate_path_string("artifacts_dir", &path).is_ok());
    }

    #[test]
    fn log_level_parse_is_case_insensitive() {
        assert_eq!(LogLevel::parse(" INFO "), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("Warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn snapshot_keys_are_stable() {
        let config = OrchestratorConfig::from_toml_str("").unwrap();
        let snapshot = config.settings_snapshot();
        let keys: Vec<&str> = snapshot.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["artifacts_dir", "log_level", "store", "telemetry"]);
        assert_eq!(snapshot["store"]["journal_mode"], "wal");
        assert_eq!(snapshot["telemetry"]["max_metrics"], DEFAULT_MAX_METRICS);
    }
}
