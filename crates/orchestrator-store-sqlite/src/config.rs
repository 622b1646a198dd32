// crates/orchestrator-store-sqlite/src/config.rs
// ============================================================================
// Module: SQLite Store Config
// Description: Connection settings and store path validation.
// Purpose: Describe how every per-thread connection is opened.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`SqliteStoreConfig`] is an immutable input to the store: every thread
//! connection is opened from the same path with the same pragmas. The path
//! must name a file on disk; per-connection in-memory databases would give
//! each thread a private store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::error::SqliteStoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Longest busy timeout `SQLite` can represent (`i32::MAX` ms).
pub const MAX_BUSY_TIMEOUT_MS: u64 = 2_147_483_647;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Modes
// ============================================================================

/// How each connection journals writes.
///
/// # Invariants
/// - Every variant names a `journal_mode` pragma that works with a shared
///   database file; `memory` and `off` are not offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// Write-ahead log; pipeline readers keep reading while one thread
    /// commits a batch.
    #[default]
    Wal,
    /// Rollback journal deleted after each commit, for filesystems where
    /// the shared-memory WAL index is unavailable.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the value written into `PRAGMA journal_mode`.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// How hard each commit waits for the disk.
///
/// # Invariants
/// - `Full` is the default so a committed run survives power loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Sync on every commit.
    #[default]
    Full,
    /// Sync at WAL checkpoints only; a crash may drop the latest commits.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the value written into `PRAGMA synchronous`.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the `SQLite` state store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory, not `:memory:`).
/// - `busy_timeout_ms` bounds how long a writer waits for the file lock
///   before failing with [`SqliteStoreError::Busy`]; it must not exceed
///   [`MAX_BUSY_TIMEOUT_MS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with default pragmas and timeout.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Path Helpers
// ============================================================================

/// Rejects store files that thread connections cannot share.
///
/// Empty paths, `:memory:`, directories, and paths beyond the component or
/// total length limits are [`SqliteStoreError::Invalid`].
pub(crate) fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    if path.as_os_str() == ":memory:" {
        return Err(SqliteStoreError::Invalid(
            "store path must name a file; in-memory databases are per connection".to_string(),
        ));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path is longer than the supported limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path has a component longer than the supported limit".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Rejects busy timeouts `SQLite` cannot represent.
pub(crate) fn validate_busy_timeout(busy_timeout_ms: u64) -> Result<(), SqliteStoreError> {
    if busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
        return Err(SqliteStoreError::Invalid(format!(
            "busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}"
        )));
    }
    Ok(())
}

/// Creates the directory that will hold the database file.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}
