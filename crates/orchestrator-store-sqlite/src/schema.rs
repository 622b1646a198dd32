// crates/orchestrator-store-sqlite/src/schema.rs
// ============================================================================
// Module: Store Schema
// Description: Idempotent table and index creation for the state store.
// Purpose: Bring any connection's database file to the current schema.
// Dependencies: rusqlite, tracing
// ============================================================================

//! ## Overview
//! [`ensure_schema`] runs on every new connection. The common path is a
//! single read of `store_meta` inside a deferred transaction. Only when the
//! version row is missing does it take the write lock, re-check, and create
//! the tables, so concurrent first contact from several threads creates the
//! schema exactly once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params;

use crate::error::SqliteStoreError;
use crate::error::map_db_error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
pub(crate) const SCHEMA_VERSION: i64 = 1;

/// Tables and indexes for [`SCHEMA_VERSION`].
const SCHEMA_DDL: &str = "CREATE TABLE IF NOT EXISTS runs (
        run_id TEXT PRIMARY KEY,
        run_type TEXT NOT NULL,
        settings_snapshot_json TEXT NOT NULL,
        status TEXT NOT NULL,
        started_at TEXT NOT NULL,
        finished_at TEXT,
        finish_reason TEXT
    );
    CREATE TABLE IF NOT EXISTS intel_items (
        item_id TEXT PRIMARY KEY,
        run_id TEXT NOT NULL,
        item_type TEXT NOT NULL,
        title TEXT NOT NULL,
        summary TEXT NOT NULL,
        claims_json TEXT,
        evidence_json TEXT,
        scores_json TEXT,
        risk_flags_json TEXT,
        explainability_json TEXT,
        decision TEXT,
        decision_reason TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_intel_items_run_id ON intel_items (run_id);
    CREATE INDEX IF NOT EXISTS idx_intel_items_created_at ON intel_items (created_at);
    CREATE TABLE IF NOT EXISTS run_telemetry (
        run_id TEXT PRIMARY KEY,
        telemetry_json TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (run_id) REFERENCES runs(run_id)
    );";

// ============================================================================
// SECTION: Schema Manager
// ============================================================================

/// Creates the store schema if absent and validates its version.
pub(crate) fn ensure_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let version = {
        let tx = connection.transaction().map_err(|err| map_db_error(&err))?;
        let version = read_version(&tx)?;
        tx.commit().map_err(|err| map_db_error(&err))?;
        version
    };
    match version {
        Some(value) if value == SCHEMA_VERSION => Ok(()),
        Some(value) => Err(SqliteStoreError::VersionMismatch(format!(
            "unsupported schema version: {value}"
        ))),
        None => create_schema(connection),
    }
}

/// Creates the schema under the write lock, re-checking the version first.
fn create_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|err| map_db_error(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| map_db_error(&err))?;
    match read_version(&tx)? {
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
        None => {
            tx.execute_batch(SCHEMA_DDL).map_err(|err| map_db_error(&err))?;
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| map_db_error(&err))?;
            tracing::info!(version = SCHEMA_VERSION, "created state store schema");
        }
    }
    tx.commit().map_err(|err| map_db_error(&err))
}

/// Reads the stored schema version without taking the write lock.
fn read_version(connection: &Connection) -> Result<Option<i64>, SqliteStoreError> {
    let has_meta: bool = connection
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = \
             'store_meta')",
            params![],
            |row| row.get(0),
        )
        .map_err(|err| map_db_error(&err))?;
    if !has_meta {
        return Ok(None);
    }
    connection
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| map_db_error(&err))
}
