// crates/orchestrator-store-sqlite/src/connections.rs
// ============================================================================
// Module: Thread Connection Registry
// Description: Per-thread SQLite connections owned by one store instance.
// Purpose: Give each calling thread an exclusive, lazily opened connection.
// Dependencies: rusqlite, tracing
// ============================================================================

//! ## Overview
//! The registry maps thread identity to that thread's connection. A thread's
//! first call opens a connection, applies pragmas, and runs the schema
//! check; later calls from the same thread reuse it. The registry mutex
//! guards only the map. Each connection sits behind its own mutex, which
//! only its owning thread takes during normal operation, so it is never
//! contended except by [`ConnectionRegistry::close_all`].
//!
//! Closing removes every entry from the map. A connection still held by an
//! in-flight operation on another thread stays valid until that operation
//! drops its handle; it is closed then.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::thread::ThreadId;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;

use crate::config::SqliteStoreConfig;
use crate::error::SqliteStoreError;
use crate::error::map_db_error;
use crate::schema::ensure_schema;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A connection plus the transaction state of its owning thread.
pub(crate) struct ThreadConnection {
    /// Open `SQLite` connection.
    pub(crate) connection: Connection,
    /// True while an explicit transaction scope is open on this connection.
    pub(crate) in_transaction: bool,
}

/// Shared handle to one thread's connection.
pub(crate) type ConnectionSlot = Arc<Mutex<ThreadConnection>>;

/// Registry of thread-affine connections for one store.
///
/// # Invariants
/// - At most one connection per thread identity.
/// - Once closed, no new connection is registered.
pub(crate) struct ConnectionRegistry {
    /// Settings used for every connection.
    config: SqliteStoreConfig,
    /// Connections by owning thread.
    slots: Mutex<HashMap<ThreadId, ConnectionSlot>>,
    /// Set by the first [`ConnectionRegistry::close_all`].
    closed: AtomicBool,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub(crate) fn new(config: SqliteStoreConfig) -> Self {
        Self {
            config,
            slots: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the calling thread's connection, opening it on first use.
    pub(crate) fn acquire(&self) -> Result<ConnectionSlot, SqliteStoreError> {
        let thread_id = thread::current().id();
        {
            let slots = self.lock_slots()?;
            self.ensure_open()?;
            if let Some(slot) = slots.get(&thread_id) {
                return Ok(Arc::clone(slot));
            }
        }
        let mut connection = open_connection(&self.config)?;
        ensure_schema(&mut connection)?;
        let slot = Arc::new(Mutex::new(ThreadConnection {
            connection,
            in_transaction: false,
        }));
        let mut slots = self.lock_slots()?;
        self.ensure_open()?;
        slots.insert(thread_id, Arc::clone(&slot));
        tracing::debug!(open_connections = slots.len(), "opened thread connection");
        drop(slots);
        Ok(slot)
    }

    /// Runs `op` with exclusive access to the calling thread's connection.
    pub(crate) fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut ThreadConnection) -> Result<T, SqliteStoreError>,
    ) -> Result<T, SqliteStoreError> {
        let slot = self.acquire()?;
        let mut guard = lock_slot(&slot)?;
        op(&mut guard)
    }

    /// Closes the calling thread's connection if it has one.
    pub(crate) fn release_current(&self) -> Result<bool, SqliteStoreError> {
        let thread_id = thread::current().id();
        let slot = self.lock_slots()?.remove(&thread_id);
        match slot {
            Some(slot) => {
                close_slot(slot)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Closes every tracked connection; later calls are no-ops.
    pub(crate) fn close_all(&self) -> Result<(), SqliteStoreError> {
        let drained: Vec<ConnectionSlot> = {
            let mut slots = self.lock_slots()?;
            if self.closed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            slots.drain().map(|(_, slot)| slot).collect()
        };
        let count = drained.len();
        let mut first_error = None;
        for slot in drained {
            if let Err(err) = close_slot(slot) {
                tracing::warn!(error = %err, "failed to close thread connection");
                first_error.get_or_insert(err);
            }
        }
        tracing::debug!(closed_connections = count, "closed state store connections");
        first_error.map_or(Ok(()), Err)
    }

    /// Returns true once [`ConnectionRegistry::close_all`] has run.
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns the number of registered thread connections.
    pub(crate) fn open_count(&self) -> usize {
        self.lock_slots().map_or(0, |slots| slots.len())
    }

    /// Fails with [`SqliteStoreError::Usage`] after close.
    fn ensure_open(&self) -> Result<(), SqliteStoreError> {
        if self.is_closed() {
            return Err(SqliteStoreError::Usage("state store has been closed".to_string()));
        }
        Ok(())
    }

    /// Locks the thread map.
    fn lock_slots(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<ThreadId, ConnectionSlot>>, SqliteStoreError> {
        self.slots
            .lock()
            .map_err(|_| SqliteStoreError::Io("connection registry mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Locks one thread connection.
pub(crate) fn lock_slot(
    slot: &Mutex<ThreadConnection>,
) -> Result<MutexGuard<'_, ThreadConnection>, SqliteStoreError> {
    slot.lock().map_err(|_| SqliteStoreError::Io("thread connection mutex poisoned".to_string()))
}

/// Closes a connection unless another holder still uses it.
fn close_slot(slot: ConnectionSlot) -> Result<(), SqliteStoreError> {
    let Ok(mutex) = Arc::try_unwrap(slot) else {
        tracing::debug!("thread connection still in use; closing when released");
        return Ok(());
    };
    let thread_connection = mutex
        .into_inner()
        .map_err(|_| SqliteStoreError::Io("thread connection mutex poisoned".to_string()))?;
    thread_connection.connection.close().map_err(|(_, err)| map_db_error(&err))
}

/// Opens an `SQLite` connection for exclusive use by one thread.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| map_db_error(&err))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies durability pragmas and the lock wait timeout.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| map_db_error(&err))?;
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(|err| map_db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| map_db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| map_db_error(&err))?;
    Ok(())
}
