// crates/orchestrator-store-sqlite/src/error.rs
// ============================================================================
// Module: SQLite Store Errors
// Description: Error taxonomy for the orchestrator state store.
// Purpose: Classify failures so callers can tell contention from misuse.
// Dependencies: orchestrator-core, rusqlite, thiserror
// ============================================================================

//! ## Overview
//! Every store operation fails with a [`SqliteStoreError`]. Engine errors are
//! classified by `SQLite` result code: lock contention that outlasted the
//! busy timeout becomes [`SqliteStoreError::Busy`], anything else
//! [`SqliteStoreError::Db`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use orchestrator_core::ItemValidationError;
use rusqlite::ErrorCode;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Messages never embed item container payloads or settings snapshots.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Filesystem or lock-poisoning failure.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Write lock wait exceeded the configured busy timeout.
    #[error("sqlite store busy: {0}")]
    Busy(String),
    /// Referenced record does not exist.
    #[error("sqlite store record not found: {0}")]
    NotFound(String),
    /// Record failed boundary validation; nothing was written.
    #[error("sqlite store validation failed: {0}")]
    Validation(String),
    /// Stored value could not be decoded.
    #[error("sqlite store corrupt data for {record_id}: {message}")]
    Corrupt {
        /// Identifier of the offending row.
        record_id: String,
        /// Decode failure detail.
        message: String,
    },
    /// API misuse (nested transaction, use after close).
    #[error("sqlite store usage error: {0}")]
    Usage(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store configuration.
    #[error("sqlite store invalid config: {0}")]
    Invalid(String),
}

impl From<ItemValidationError> for SqliteStoreError {
    fn from(error: ItemValidationError) -> Self {
        Self::Validation(error.to_string())
    }
}

/// Classifies a `rusqlite` error by its `SQLite` result code.
pub(crate) fn map_db_error(error: &rusqlite::Error) -> SqliteStoreError {
    match error.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            SqliteStoreError::Busy(error.to_string())
        }
        _ => SqliteStoreError::Db(error.to_string()),
    }
}
