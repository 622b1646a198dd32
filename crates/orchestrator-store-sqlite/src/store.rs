// crates/orchestrator-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite State Store
// Description: Run lifecycle and intel item persistence backed by SQLite.
// Purpose: Provide atomic, idempotent record writes across many threads.
// Dependencies: orchestrator-core, rusqlite, serde_json, tracing
// ============================================================================

//! ## Overview
//! [`SqliteStateStore`] is the record-access API of the orchestrator. Every
//! calling thread gets its own connection from the connection registry, so
//! reads never contend on a process-wide lock.
//! `SQLite` still serializes writers at the file level: each write takes the
//! database write lock up front (`BEGIN IMMEDIATE`) and waits up to the
//! configured busy timeout before failing with [`SqliteStoreError::Busy`].
//!
//! Items are validated and encoded before any write begins. A batch is
//! committed exactly once, so a failing batch leaves no rows behind. Writes
//! issued inside an open [`TransactionScope`] run under a savepoint and
//! become durable with the outer commit.
//!
//! Security posture: database contents are untrusted; every stored container
//! field and snapshot is decoded fail-closed into [`SqliteStoreError::Corrupt`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use orchestrator_core::IntelItem;
use orchestrator_core::ItemId;
use orchestrator_core::MonotonicClock;
use orchestrator_core::Run;
use orchestrator_core::RunId;
use orchestrator_core::RunStatus;
use orchestrator_core::StoredIntelItem;
use orchestrator_core::TelemetryStore;
use orchestrator_core::UtcTimestamp;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde_json::Value;

use crate::codec::EncodedContainers;
use crate::codec::RawContainers;
use crate::codec::decode_value;
use crate::codec::encode_value;
use crate::config::SqliteStoreConfig;
use crate::config::ensure_parent_dir;
use crate::config::validate_busy_timeout;
use crate::config::validate_store_path;
use crate::connections::ConnectionRegistry;
use crate::connections::ConnectionSlot;
use crate::connections::ThreadConnection;
use crate::connections::lock_slot;
use crate::error::SqliteStoreError;
use crate::error::map_db_error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Metric name for started runs.
pub const METRIC_RUNS_STARTED: &str = "state_store.runs_started";
/// Metric name for finished runs.
pub const METRIC_RUNS_FINISHED: &str = "state_store.runs_finished";
/// Metric name for intel items written.
pub const METRIC_ITEMS_UPSERTED: &str = "state_store.items_upserted";
/// Metric name for committed batch upserts.
pub const METRIC_BATCHES_COMMITTED: &str = "state_store.batches_committed";
/// Metric name for writes that failed and were rolled back.
pub const METRIC_WRITE_FAILURES: &str = "state_store.write_failures";

/// Column list shared by item reads.
const ITEM_COLUMNS: &str = "item_id, run_id, item_type, title, summary, claims_json, \
                            evidence_json, scores_json, risk_flags_json, explainability_json, \
                            decision, decision_reason, created_at";

/// Insert-or-replace keyed on `item_id`; `created_at` keeps first insertion.
const UPSERT_ITEM_SQL: &str = "INSERT INTO intel_items (item_id, run_id, item_type, title, \
                               summary, claims_json, evidence_json, scores_json, \
                               risk_flags_json, explainability_json, decision, \
                               decision_reason, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
     ON CONFLICT(item_id) DO UPDATE SET
         run_id = excluded.run_id,
         item_type = excluded.item_type,
         title = excluded.title,
         summary = excluded.summary,
         claims_json = excluded.claims_json,
         evidence_json = excluded.evidence_json,
         scores_json = excluded.scores_json,
         risk_flags_json = excluded.risk_flags_json,
         explainability_json = excluded.explainability_json,
         decision = excluded.decision,
         decision_reason = excluded.decision_reason";

// ============================================================================
// SECTION: State Store
// ============================================================================

/// Thread-safe `SQLite` store for runs and intel items.
///
/// Share one instance across threads with [`Arc`]. Dropping the store closes
/// every thread connection it opened.
///
/// # Invariants
/// - Each thread uses only its own connection.
/// - Every failed atomic write is rolled back before its error is returned.
/// - After [`SqliteStateStore::close`], every operation fails with
///   [`SqliteStoreError::Usage`].
pub struct SqliteStateStore {
    /// Thread-affine connections.
    connections: ConnectionRegistry,
    /// Source of strictly increasing record timestamps.
    clock: MonotonicClock,
    /// Registry receiving operational counters.
    telemetry: Arc<TelemetryStore>,
    /// Running totals mirrored into `telemetry`.
    counters: StoreCounters,
}

impl SqliteStateStore {
    /// Opens the store, creating the database file and schema if needed.
    ///
    /// The first connection is opened on the calling thread so that path,
    /// permission, and schema version problems surface here.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] for an unusable path or busy
    /// timeout,
    /// [`SqliteStoreError::VersionMismatch`] for a foreign schema, or a
    /// database error when the file cannot be opened.
    pub fn open(
        config: SqliteStoreConfig,
        telemetry: Arc<TelemetryStore>,
    ) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        validate_busy_timeout(config.busy_timeout_ms)?;
        ensure_parent_dir(&config.path)?;
        let store = Self {
            connections: ConnectionRegistry::new(config),
            clock: MonotonicClock::new(),
            telemetry,
            counters: StoreCounters::default(),
        };
        store.connections.acquire()?;
        Ok(store)
    }

    /// Returns the telemetry registry receiving store counters.
    #[must_use]
    pub fn telemetry(&self) -> &TelemetryStore {
        &self.telemetry
    }

    /// Inserts a run in the `running` state, overwriting any existing run
    /// with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the write fails.
    pub fn start_run(
        &self,
        run_id: &RunId,
        run_type: &str,
        settings_snapshot: &Value,
    ) -> Result<Run, SqliteStoreError> {
        let snapshot_json = encode_value(settings_snapshot)?;
        let run = Run {
            run_id: run_id.clone(),
            run_type: run_type.to_string(),
            settings_snapshot: settings_snapshot.clone(),
            status: RunStatus::Running,
            started_at: self.clock.now(),
            finished_at: None,
            finish_reason: None,
        };
        self.write_atomic("start_run", |connection| {
            connection
                .execute(
                    "INSERT INTO runs (run_id, run_type, settings_snapshot_json, status, \
                     started_at, finished_at, finish_reason)
                     VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL)
                     ON CONFLICT(run_id) DO UPDATE SET
                         run_type = excluded.run_type,
                         settings_snapshot_json = excluded.settings_snapshot_json,
                         status = excluded.status,
                         started_at = excluded.started_at,
                         finished_at = NULL,
                         finish_reason = NULL",
                    params![
                        run.run_id.as_str(),
                        run.run_type,
                        snapshot_json,
                        run.status.as_str(),
                        run.started_at.as_str()
                    ],
                )
                .map_err(|err| map_db_error(&err))?;
            Ok(())
        })?;
        tracing::debug!(run_id = %run.run_id, run_type = %run.run_type, "run started");
        self.bump(&self.counters.runs_started, METRIC_RUNS_STARTED, 1);
        Ok(run)
    }

    /// Marks a run finished with a terminal status.
    ///
    /// Finishing an already finished run overwrites its terminal fields.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Validation`] for a non-terminal status and
    /// [`SqliteStoreError::NotFound`] for an unknown run.
    pub fn finish_run(
        &self,
        run_id: &RunId,
        status: RunStatus,
        reason: Option<&str>,
    ) -> Result<Run, SqliteStoreError> {
        if !status.is_terminal() {
            return Err(SqliteStoreError::Validation(format!(
                "run {run_id} cannot finish with status {}",
                status.as_str()
            )));
        }
        let finished_at = self.clock.now();
        let run = self.write_atomic("finish_run", |connection| {
            let changed = connection
                .execute(
                    "UPDATE runs SET status = ?2, finished_at = ?3, finish_reason = ?4 WHERE \
                     run_id = ?1",
                    params![run_id.as_str(), status.as_str(), finished_at.as_str(), reason],
                )
                .map_err(|err| map_db_error(&err))?;
            if changed == 0 {
                return Err(SqliteStoreError::NotFound(format!("run {run_id}")));
            }
            read_run(connection, run_id)?
                .ok_or_else(|| SqliteStoreError::NotFound(format!("run {run_id}")))
        })?;
        tracing::debug!(run_id = %run_id, status = status.as_str(), "run finished");
        self.bump(&self.counters.runs_finished, METRIC_RUNS_FINISHED, 1);
        Ok(run)
    }

    /// Loads a run by id.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Corrupt`] when the stored row cannot be
    /// decoded.
    pub fn get_run(&self, run_id: &RunId) -> Result<Option<Run>, SqliteStoreError> {
        self.connections.with_connection(|thread_connection| {
            read_run(&thread_connection.connection, run_id)
        })
    }

    /// Inserts or fully replaces one intel item and commits it.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Validation`] when a required field is
    /// missing; nothing is written in that case.
    pub fn upsert_intel_item(&self, item: &IntelItem) -> Result<(), SqliteStoreError> {
        let prepared = self.prepare_item(item)?;
        self.write_atomic("upsert_intel_item", |connection| apply_item_upsert(connection, &prepared))?;
        self.bump(&self.counters.items_upserted, METRIC_ITEMS_UPSERTED, 1);
        Ok(())
    }

    /// Inserts or replaces every item in one atomic commit.
    ///
    /// Returns the number of items written.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Validation`] when any item is invalid.
    /// No item of the batch is persisted when any error is returned.
    pub fn upsert_intel_items_batch(&self, items: &[IntelItem]) -> Result<usize, SqliteStoreError> {
        let prepared =
            items.iter().map(|item| self.prepare_item(item)).collect::<Result<Vec<_>, _>>()?;
        if prepared.is_empty() {
            return Ok(0);
        }
        self.write_atomic("upsert_intel_items_batch", |connection| {
            for item in &prepared {
                apply_item_upsert(connection, item)?;
            }
            Ok(())
        })?;
        let count = prepared.len();
        let written = u64::try_from(count).unwrap_or(u64::MAX);
        self.bump(&self.counters.items_upserted, METRIC_ITEMS_UPSERTED, written);
        self.bump(&self.counters.batches_committed, METRIC_BATCHES_COMMITTED, 1);
        Ok(count)
    }

    /// Lists a run's items ordered by `created_at`, then `item_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Corrupt`] naming the first item whose
    /// stored containers cannot be decoded.
    pub fn list_intel_items_for_run(
        &self,
        run_id: &RunId,
    ) -> Result<Vec<StoredIntelItem>, SqliteStoreError> {
        let rows = self.connections.with_connection(|thread_connection| {
            let mut stmt = thread_connection
                .connection
                .prepare_cached(&format!(
                    "SELECT {ITEM_COLUMNS} FROM intel_items WHERE run_id = ?1 ORDER BY \
                     created_at ASC, item_id ASC"
                ))
                .map_err(|err| map_db_error(&err))?;
            let rows = stmt
                .query_map(params![run_id.as_str()], ItemRow::from_row)
                .map_err(|err| map_db_error(&err))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|err| map_db_error(&err))
        })?;
        rows.into_iter().map(ItemRow::into_stored).collect()
    }

    /// Persists a telemetry snapshot for a run, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::NotFound`] for an unknown run.
    pub fn write_run_telemetry(
        &self,
        run_id: &RunId,
        snapshot: &Value,
    ) -> Result<(), SqliteStoreError> {
        let snapshot_json = encode_value(snapshot)?;
        let created_at = self.clock.now();
        self.write_atomic("write_run_telemetry", |connection| {
            if !run_exists(connection, run_id)? {
                return Err(SqliteStoreError::NotFound(format!("run {run_id}")));
            }
            connection
                .execute(
                    "INSERT INTO run_telemetry (run_id, telemetry_json, created_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(run_id) DO UPDATE SET
                         telemetry_json = excluded.telemetry_json,
                         created_at = excluded.created_at",
                    params![run_id.as_str(), snapshot_json, created_at.as_str()],
                )
                .map_err(|err| map_db_error(&err))?;
            Ok(())
        })
    }

    /// Loads the telemetry snapshot stored for a run.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Corrupt`] when the snapshot is not JSON.
    pub fn load_run_telemetry(&self, run_id: &RunId) -> Result<Option<Value>, SqliteStoreError> {
        let text: Option<String> = self.connections.with_connection(|thread_connection| {
            thread_connection
                .connection
                .query_row(
                    "SELECT telemetry_json FROM run_telemetry WHERE run_id = ?1",
                    params![run_id.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| map_db_error(&err))
        })?;
        text.map(|text| decode_value(run_id.as_str(), "telemetry_json", &text)).transpose()
    }

    /// Opens a transaction on the calling thread's connection.
    ///
    /// The scope rolls back when dropped without [`TransactionScope::commit`].
    /// Store operations issued on this thread while the scope is open join it.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Usage`] when a transaction is already open
    /// on this thread and [`SqliteStoreError::Busy`] when the write lock
    /// cannot be taken in time.
    pub fn begin_transaction(&self) -> Result<TransactionScope<'_>, SqliteStoreError> {
        let slot = self.connections.acquire()?;
        {
            let mut guard = lock_slot(&slot)?;
            if guard.in_transaction {
                return Err(SqliteStoreError::Usage(
                    "transaction already open on this thread".to_string(),
                ));
            }
            guard.connection.execute_batch("BEGIN IMMEDIATE;").map_err(|err| map_db_error(&err))?;
            guard.in_transaction = true;
        }
        Ok(TransactionScope {
            slot,
            finished: false,
            _store: PhantomData,
        })
    }

    /// Runs `op` inside a transaction, committing on `Ok` and rolling back on
    /// `Err` or unwind.
    ///
    /// # Errors
    ///
    /// Returns the error of `op`, or the store error raised while opening or
    /// committing the transaction.
    pub fn transaction<T, E>(&self, op: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<SqliteStoreError>,
    {
        let scope = self.begin_transaction()?;
        match op(self) {
            Ok(value) => {
                scope.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = scope.rollback() {
                    tracing::warn!(error = %rollback_err, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Returns the number of open thread connections.
    #[must_use]
    pub fn open_connection_count(&self) -> usize {
        self.connections.open_count()
    }

    /// Closes the calling thread's connection, returning true if one was open.
    ///
    /// The next operation on this thread opens a fresh connection.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Usage`] after [`SqliteStateStore::close`]
    /// or while a transaction is open on this thread.
    pub fn release_thread_connection(&self) -> Result<bool, SqliteStoreError> {
        let in_transaction = self
            .connections
            .with_connection(|thread_connection| Ok(thread_connection.in_transaction))?;
        if in_transaction {
            return Err(SqliteStoreError::Usage(
                "cannot release a connection with an open transaction".to_string(),
            ));
        }
        self.connections.release_current()
    }

    /// Closes every thread connection. Later calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns the first connection close failure; remaining connections are
    /// still closed.
    pub fn close(&self) -> Result<(), SqliteStoreError> {
        self.connections.close_all()
    }

    /// Returns true once the store has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.connections.is_closed()
    }

    /// Validates and encodes an item, stamping its insertion time.
    fn prepare_item(&self, item: &IntelItem) -> Result<PreparedItem, SqliteStoreError> {
        item.validate()?;
        let containers = EncodedContainers::encode(item)?;
        Ok(PreparedItem {
            item_id: item.item_id.clone(),
            run_id: item.run_id.clone(),
            item_type: item.item_type.clone(),
            title: item.title.clone(),
            summary: item.summary.clone(),
            containers,
            decision: item.decision.clone(),
            decision_reason: item.decision_reason.clone(),
            created_at: self.clock.now(),
        })
    }

    /// Runs `op` atomically on this thread's connection.
    ///
    /// Outside a transaction scope the write takes the write lock immediately
    /// and commits once. Inside a scope it runs under a savepoint.
    fn write_atomic<T>(
        &self,
        operation: &'static str,
        op: impl FnOnce(&Connection) -> Result<T, SqliteStoreError>,
    ) -> Result<T, SqliteStoreError> {
        let result = self.connections.with_connection(|thread_connection| {
            let ThreadConnection {
                connection,
                in_transaction,
            } = thread_connection;
            if *in_transaction {
                let savepoint = connection.savepoint().map_err(|err| map_db_error(&err))?;
                let value = op(&savepoint)?;
                savepoint.commit().map_err(|err| map_db_error(&err))?;
                Ok(value)
            } else {
                let tx = connection
                    .transaction_with_behavior(TransactionBehavior::Immediate)
                    .map_err(|err| map_db_error(&err))?;
                let value = op(&tx)?;
                tx.commit().map_err(|err| map_db_error(&err))?;
                Ok(value)
            }
        });
        if let Err(err) = &result
            && !matches!(err, SqliteStoreError::Usage(_))
        {
            tracing::warn!(operation, error = %err, "write rolled back");
            self.bump(&self.counters.write_failures, METRIC_WRITE_FAILURES, 1);
        }
        result
    }

    /// Adds `amount` to a counter and mirrors the total into telemetry.
    fn bump(&self, counter: &AtomicU64, name: &'static str, amount: u64) {
        let total = counter.fetch_add(amount, Ordering::Relaxed).saturating_add(amount);
        self.telemetry.record_metric(name, total);
    }
}

impl Drop for SqliteStateStore {
    fn drop(&mut self) {
        if let Err(err) = self.connections.close_all() {
            tracing::warn!(error = %err, "state store close failed on drop");
        }
    }
}

// ============================================================================
// SECTION: Transaction Scope
// ============================================================================

/// Open transaction on one thread's connection.
///
/// # Invariants
/// - Bound to the thread that opened it (`!Send`).
/// - Exactly one of commit or rollback runs, including on unwind.
pub struct TransactionScope<'store> {
    /// Connection carrying the transaction.
    slot: ConnectionSlot,
    /// True once committed or rolled back.
    finished: bool,
    /// Ties the scope to its store and thread.
    _store: PhantomData<(&'store SqliteStateStore, Rc<()>)>,
}

impl TransactionScope<'_> {
    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the commit fails; the transaction is
    /// rolled back before the error is returned.
    pub fn commit(mut self) -> Result<(), SqliteStoreError> {
        self.finished = true;
        let mut guard = lock_slot(&self.slot)?;
        guard.in_transaction = false;
        if let Err(err) = guard.connection.execute_batch("COMMIT;") {
            let error = map_db_error(&err);
            tracing::warn!(error = %error, "transaction commit failed; rolling back");
            roll_back_open_transaction(&guard.connection);
            return Err(error);
        }
        Ok(())
    }

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the rollback statement fails.
    pub fn rollback(mut self) -> Result<(), SqliteStoreError> {
        self.finished = true;
        let mut guard = lock_slot(&self.slot)?;
        guard.in_transaction = false;
        guard.connection.execute_batch("ROLLBACK;").map_err(|err| map_db_error(&err))
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match lock_slot(&self.slot) {
            Ok(mut guard) => {
                guard.in_transaction = false;
                tracing::warn!("transaction dropped without commit; rolling back");
                roll_back_open_transaction(&guard.connection);
            }
            Err(err) => tracing::warn!(error = %err, "transaction rollback skipped"),
        }
    }
}

/// Rolls back whatever transaction is still open on `connection`.
fn roll_back_open_transaction(connection: &Connection) {
    if connection.is_autocommit() {
        return;
    }
    if let Err(err) = connection.execute_batch("ROLLBACK;") {
        tracing::warn!(error = %err, "rollback failed");
    }
}

// ============================================================================
// SECTION: Counters
// ============================================================================

/// Running operation totals.
#[derive(Debug, Default)]
struct StoreCounters {
    /// Runs started.
    runs_started: AtomicU64,
    /// Runs finished.
    runs_finished: AtomicU64,
    /// Items written by single and batch upserts.
    items_upserted: AtomicU64,
    /// Batches committed.
    batches_committed: AtomicU64,
    /// Writes rolled back.
    write_failures: AtomicU64,
}

// ============================================================================
// SECTION: Rows
// ============================================================================

/// Validated, encoded item ready for the writer.
struct PreparedItem {
    /// Item identifier.
    item_id: ItemId,
    /// Owning run.
    run_id: RunId,
    /// Item classification.
    item_type: String,
    /// Item title.
    title: String,
    /// Item summary.
    summary: String,
    /// Encoded container columns.
    containers: EncodedContainers,
    /// Optional decision.
    decision: Option<String>,
    /// Optional decision rationale.
    decision_reason: Option<String>,
    /// Insertion timestamp, kept on replace.
    created_at: UtcTimestamp,
}

/// Writes one prepared item.
fn apply_item_upsert(connection: &Connection, item: &PreparedItem) -> Result<(), SqliteStoreError> {
    let mut stmt = connection.prepare_cached(UPSERT_ITEM_SQL).map_err(|err| map_db_error(&err))?;
    stmt.execute(params![
        item.item_id.as_str(),
        item.run_id.as_str(),
        item.item_type,
        item.title,
        item.summary,
        item.containers.claims,
        item.containers.evidence,
        item.containers.scores,
        item.containers.risk_flags,
        item.containers.explainability,
        item.decision,
        item.decision_reason,
        item.created_at.as_str()
    ])
    .map_err(|err| map_db_error(&err))?;
    Ok(())
}

/// Raw `intel_items` row before container decoding.
struct ItemRow {
    /// Item identifier.
    item_id: String,
    /// Owning run.
    run_id: String,
    /// Item classification.
    item_type: String,
    /// Item title.
    title: String,
    /// Item summary.
    summary: String,
    /// Undecoded container columns.
    containers: RawContainers,
    /// Optional decision.
    decision: Option<String>,
    /// Optional decision rationale.
    decision_reason: Option<String>,
    /// Insertion timestamp.
    created_at: String,
}

impl ItemRow {
    /// Reads columns in [`ITEM_COLUMNS`] order.
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            item_id: row.get(0)?,
            run_id: row.get(1)?,
            item_type: row.get(2)?,
            title: row.get(3)?,
            summary: row.get(4)?,
            containers: RawContainers {
                claims: row.get(5)?,
                evidence: row.get(6)?,
                scores: row.get(7)?,
                risk_flags: row.get(8)?,
                explainability: row.get(9)?,
            },
            decision: row.get(10)?,
            decision_reason: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    /// Decodes containers into a stored item.
    fn into_stored(self) -> Result<StoredIntelItem, SqliteStoreError> {
        let decoded = self.containers.decode(&self.item_id)?;
        Ok(StoredIntelItem {
            item: IntelItem {
                item_id: ItemId::new(self.item_id),
                run_id: RunId::new(self.run_id),
                item_type: self.item_type,
                title: self.title,
                summary: self.summary,
                claims: decoded.claims,
                evidence: decoded.evidence,
                scores: decoded.scores,
                risk_flags: decoded.risk_flags,
                explainability: decoded.explainability,
                decision: self.decision,
                decision_reason: self.decision_reason,
            },
            created_at: UtcTimestamp::from_stored(self.created_at),
        })
    }
}

/// Raw `runs` row before decoding.
struct RunRow {
    /// Run identifier.
    run_id: String,
    /// Workflow label.
    run_type: String,
    /// Encoded settings snapshot.
    settings_snapshot_json: String,
    /// Status label.
    status: String,
    /// Start timestamp.
    started_at: String,
    /// Finish timestamp.
    finished_at: Option<String>,
    /// Finish rationale.
    finish_reason: Option<String>,
}

impl RunRow {
    /// Decodes the snapshot and status.
    fn into_run(self) -> Result<Run, SqliteStoreError> {
        let settings_snapshot =
            decode_value(&self.run_id, "settings_snapshot_json", &self.settings_snapshot_json)?;
        let status = RunStatus::parse(&self.status).ok_or_else(|| SqliteStoreError::Corrupt {
            record_id: self.run_id.clone(),
            message: format!("status: unknown value {}", self.status),
        })?;
        Ok(Run {
            run_id: RunId::new(self.run_id),
            run_type: self.run_type,
            settings_snapshot,
            status,
            started_at: UtcTimestamp::from_stored(self.started_at),
            finished_at: self.finished_at.map(UtcTimestamp::from_stored),
            finish_reason: self.finish_reason,
        })
    }
}

/// Reads and decodes one run.
fn read_run(connection: &Connection, run_id: &RunId) -> Result<Option<Run>, SqliteStoreError> {
    let row = connection
        .query_row(
            "SELECT run_id, run_type, settings_snapshot_json, status, started_at, finished_at, \
             finish_reason FROM runs WHERE run_id = ?1",
            params![run_id.as_str()],
            |row| {
                Ok(RunRow {
                    run_id: row.get(0)?,
                    run_type: row.get(1)?,
                    settings_snapshot_json: row.get(2)?,
                    status: row.get(3)?,
                    started_at: row.get(4)?,
                    finished_at: row.get(5)?,
                    finish_reason: row.get(6)?,
                })
            },
        )
        .optional()
        .map_err(|err| map_db_error(&err))?;
    row.map(RunRow::into_run).transpose()
}

/// Returns true when a run row exists.
fn run_exists(connection: &Connection, run_id: &RunId) -> Result<bool, SqliteStoreError> {
    connection
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM runs WHERE run_id = ?1)",
            params![run_id.as_str()],
            |row| row.get(0),
        )
        .map_err(|err| map_db_error(&err))
}
