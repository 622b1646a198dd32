// crates/orchestrator-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite State Store
// Description: Embedded record store for orchestrator runs and intel items.
// Purpose: Provide transactional, thread-safe persistence over one SQLite file.
// Dependencies: orchestrator-core, rusqlite, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! This crate persists [`orchestrator_core::Run`] and
//! [`orchestrator_core::IntelItem`] records in a local `SQLite` database.
//! Each calling thread gets its own connection, created on first use and
//! reused until the store is closed. Writes are atomic per call; batches and
//! explicit transactions are all-or-nothing. Operational counters are
//! recorded into an [`orchestrator_core::TelemetryStore`].

// ============================================================================
// SECTION: Modules
// ============================================================================

mod codec;
pub mod config;
mod connections;
pub mod error;
mod schema;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::SqliteStoreConfig;
pub use config::SqliteStoreMode;
pub use config::SqliteSyncMode;
pub use error::SqliteStoreError;
pub use store::SqliteStateStore;
pub use store::TransactionScope;
