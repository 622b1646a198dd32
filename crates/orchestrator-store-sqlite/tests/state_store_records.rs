// crates/orchestrator-store-sqlite/tests/state_store_records.rs
// ============================================================================
// Module: State Store Record Tests
// Description: Run lifecycle, item upsert, batch, and listing behavior.
// Purpose: Validate record semantics of the SQLite state store end to end.
// ============================================================================

//! ## Overview
//! Record-level tests for [`SqliteStateStore`]:
//! - Run start, finish, re-finish, and unknown-run handling
//! - Idempotent single upserts and all-or-nothing batches
//! - Listing order, tie-breaks, and container decoding defaults
//! - Corrupt stored containers fail the listing with the item id

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;

use orchestrator_core::IntelItem;
use orchestrator_core::RunId;
use orchestrator_core::RunStatus;
use orchestrator_core::TelemetryStore;
use orchestrator_store_sqlite::SqliteStateStore;
use orchestrator_store_sqlite::SqliteStoreConfig;
use orchestrator_store_sqlite::SqliteStoreError;
use orchestrator_store_sqlite::store::METRIC_BATCHES_COMMITTED;
use orchestrator_store_sqlite::store::METRIC_ITEMS_UPSERTED;
use orchestrator_store_sqlite::store::METRIC_RUNS_STARTED;
use orchestrator_store_sqlite::store::METRIC_WRITE_FAILURES;
use proptest::prelude::*;
use rusqlite::Connection;
use rusqlite::params;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn store_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("state.sqlite")
}

fn open_store(dir: &TempDir) -> SqliteStateStore {
    let config = SqliteStoreConfig::new(store_path(dir));
    SqliteStateStore::open(config, Arc::new(TelemetryStore::new())).unwrap()
}

fn item(item_id: &str, run_id: &str) -> IntelItem {
    IntelItem::new(item_id, run_id, "mention", format!("title {item_id}"), "summary")
}

fn item_ids(store: &SqliteStateStore, run_id: &str) -> Vec<String> {
    store
        .list_intel_items_for_run(&RunId::new(run_id))
        .unwrap()
        .into_iter()
        .map(|stored| stored.item.item_id.to_string())
        .collect()
}

// ============================================================================
// SECTION: Runs
// ============================================================================

#[test]
fn daily_run_lifecycle() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let run_id = RunId::new("r1");

    let started = store.start_run(&run_id, "daily", &json!({})).unwrap();
    assert_eq!(started.status, RunStatus::Running);
    assert!(started.finished_at.is_none());

    let written = store
        .upsert_intel_items_batch(&[item("item-1", "r1"), item("item-2", "r1"), item("item-3", "r1")])
        .unwrap();
    assert_eq!(written, 3);
    assert_eq!(item_ids(&store, "r1"), vec!["item-1", "item-2", "item-3"]);

    let finished = store.finish_run(&run_id, RunStatus::Completed, None).unwrap();
    assert_eq!(finished.status, RunStatus::Completed);
    assert!(finished.finished_at.is_some());
    assert!(finished.finished_at.as_ref().unwrap() > &finished.started_at);

    let loaded = store.get_run(&run_id).unwrap().unwrap();
    assert_eq!(loaded, finished);
}

#[test]
fn start_run_overwrites_existing_run() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let run_id = RunId::new("r1");
    store.start_run(&run_id, "daily", &json!({"mode": "a"})).unwrap();
    store.finish_run(&run_id, RunStatus::Failed, Some("timeout")).unwrap();

    let restarted = store.start_run(&run_id, "weekly", &json!({"mode": "b"})).unwrap();
    let loaded = store.get_run(&run_id).unwrap().unwrap();
    assert_eq!(loaded, restarted);
    assert_eq!(loaded.run_type, "weekly");
    assert_eq!(loaded.settings_snapshot, json!({"mode": "b"}));
    assert_eq!(loaded.status, RunStatus::Running);
    assert!(loaded.finished_at.is_none());
    assert!(loaded.finish_reason.is_none());
}

#[test]
fn refinishing_a_run_overwrites_terminal_fields() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let run_id = RunId::new("r1");
    store.start_run(&run_id, "daily", &json!({})).unwrap();
    let first = store.finish_run(&run_id, RunStatus::Partial, Some("quota")).unwrap();
    let second = store.finish_run(&run_id, RunStatus::Completed, None).unwrap();

    assert_eq!(second.status, RunStatus::Completed);
    assert!(second.finish_reason.is_none());
    assert!(second.finished_at > first.finished_at);
}

#[test]
fn finishing_unknown_run_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let err = store.finish_run(&RunId::new("missing"), RunStatus::Completed, None).unwrap_err();
    assert!(matches!(err, SqliteStoreError::NotFound(_)), "unexpected error: {err}");
    assert!(store.get_run(&RunId::new("missing")).unwrap().is_none());
}

#[test]
fn finishing_with_running_status_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let run_id = RunId::new("r1");
    store.start_run(&run_id, "daily", &json!({})).unwrap();
    let err = store.finish_run(&run_id, RunStatus::Running, None).unwrap_err();
    assert!(matches!(err, SqliteStoreError::Validation(_)));
    assert_eq!(store.get_run(&run_id).unwrap().unwrap().status, RunStatus::Running);
}

#[test]
fn run_counters_reach_telemetry() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.start_run(&RunId::new("r1"), "daily", &json!({})).unwrap();
    store.start_run(&RunId::new("r2"), "daily", &json!({})).unwrap();
    store.upsert_intel_items_batch(&[item("a", "r1"), item("b", "r1")]).unwrap();
    store.upsert_intel_item(&item("c", "r2")).unwrap();
    let _ = store.finish_run(&RunId::new("missing"), RunStatus::Failed, None);

    let telemetry = store.telemetry();
    assert_eq!(telemetry.get(METRIC_RUNS_STARTED).unwrap().value, json!(2));
    assert_eq!(telemetry.get(METRIC_ITEMS_UPSERTED).unwrap().value, json!(3));
    assert_eq!(telemetry.get(METRIC_BATCHES_COMMITTED).unwrap().value, json!(1));
    assert_eq!(telemetry.get(METRIC_WRITE_FAILURES).unwrap().value, json!(1));
}

#[test]
fn run_telemetry_round_trips_and_requires_run() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let run_id = RunId::new("r1");

    let err = store.write_run_telemetry(&run_id, &json!({"a": 1})).unwrap_err();
    assert!(matches!(err, SqliteStoreError::NotFound(_)));

    store.start_run(&run_id, "daily", &json!({})).unwrap();
    assert!(store.load_run_telemetry(&run_id).unwrap().is_none());
    store.telemetry().record_metric("fetch.count", 4);
    store.write_run_telemetry(&run_id, &store.telemetry().to_json()).unwrap();
    store.write_run_telemetry(&run_id, &json!({"fetch.count": {"value": 5}})).unwrap();

    let loaded = store.load_run_telemetry(&run_id).unwrap().unwrap();
    assert_eq!(loaded, json!({"fetch.count": {"value": 5}}));
}

// ============================================================================
// SECTION: Items
// ============================================================================

#[test]
fn upsert_is_idempotent_and_fully_replaces() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut first = item("item-1", "r1");
    first.decision = Some("publish".to_string());
    first.claims = vec!["claim a".to_string()];
    first.scores.insert("relevance".to_string(), 0.9);
    store.upsert_intel_item(&first).unwrap();
    let created_at = store.list_intel_items_for_run(&RunId::new("r1")).unwrap()[0].created_at.clone();

    let mut second = item("item-1", "r1");
    second.title = "revised".to_string();
    second.decision = Some("hold".to_string());
    store.upsert_intel_item(&second).unwrap();
    store.upsert_intel_item(&second).unwrap();

    let listed = store.list_intel_items_for_run(&RunId::new("r1")).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].item, second);
    assert!(listed[0].item.claims.is_empty());
    assert!(listed[0].item.scores.is_empty());
    assert_eq!(listed[0].created_at, created_at);
}

#[test]
fn invalid_single_upsert_leaves_prior_row() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let original = item("item-1", "r1");
    store.upsert_intel_item(&original).unwrap();

    let mut broken = item("item-1", "r1");
    broken.summary = "  ".to_string();
    let err = store.upsert_intel_item(&broken).unwrap_err();
    assert!(matches!(err, SqliteStoreError::Validation(_)));

    let listed = store.list_intel_items_for_run(&RunId::new("r1")).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].item, original);
}

#[test]
fn batch_with_missing_title_persists_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut invalid = item("item-2", "r1");
    invalid.title = String::new();

    let err = store.upsert_intel_items_batch(&[item("item-1", "r1"), invalid]).unwrap_err();
    assert!(matches!(err, SqliteStoreError::Validation(_)), "unexpected error: {err}");
    assert!(item_ids(&store, "r1").is_empty());
}

#[test]
fn batch_with_non_finite_score_persists_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut invalid = item("item-2", "r1");
    invalid.scores.insert("risk".to_string(), f64::NAN);

    let err = store.upsert_intel_items_batch(&[item("item-1", "r1"), invalid]).unwrap_err();
    assert!(matches!(err, SqliteStoreError::Validation(_)));
    assert!(item_ids(&store, "r1").is_empty());
}

#[test]
fn empty_batch_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    assert_eq!(store.upsert_intel_items_batch(&[]).unwrap(), 0);
    assert!(store.telemetry().get(METRIC_BATCHES_COMMITTED).is_none());
}

#[test]
fn containers_survive_storage() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut rich = item("item-1", "r1");
    rich.claims = vec!["first".to_string(), "second".to_string()];
    rich.evidence = vec![json!({"url": "https://example.test/a"}), json!("quote")];
    rich.scores.insert("relevance".to_string(), 0.75);
    rich.scores.insert("risk".to_string(), 0.1);
    rich.risk_flags = vec!["legal".to_string()];
    rich.explainability = vec!["matched brand keyword".to_string()];
    rich.decision = Some("escalate".to_string());
    rich.decision_reason = Some("legal flag".to_string());
    store.upsert_intel_item(&rich).unwrap();

    let listed = store.list_intel_items_for_run(&RunId::new("r1")).unwrap();
    assert_eq!(listed[0].item, rich);
    assert_eq!(listed[0].item.scores["relevance"], 0.75);
}

#[test]
fn listing_is_scoped_to_run_and_ordered_by_insertion() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.upsert_intel_item(&item("zeta", "r1")).unwrap();
    store.upsert_intel_item(&item("other", "r2")).unwrap();
    store.upsert_intel_items_batch(&[item("beta", "r1"), item("alpha", "r1")]).unwrap();

    assert_eq!(item_ids(&store, "r1"), vec!["zeta", "beta", "alpha"]);
    assert_eq!(item_ids(&store, "r2"), vec!["other"]);
    assert!(item_ids(&store, "r3").is_empty());
}

#[test]
fn equal_timestamps_fall_back_to_item_id() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let store = open_store(&dir);
    store.upsert_intel_items_batch(&[item("c", "r1"), item("a", "r1"), item("b", "r1")]).unwrap();

    let raw = Connection::open(&path).unwrap();
    raw.execute(
        "UPDATE intel_items SET created_at = '2024-01-01T00:00:00.000000Z' WHERE run_id = 'r1'",
        [],
    )
    .unwrap();
    drop(raw);

    assert_eq!(item_ids(&store, "r1"), vec!["a", "b", "c"]);
}

#[test]
fn null_and_empty_containers_decode_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let store = open_store(&dir);
    store.upsert_intel_items_batch(&[item("a", "r1"), item("b", "r1")]).unwrap();

    let raw = Connection::open(&path).unwrap();
    raw.execute(
        "UPDATE intel_items SET claims_json = NULL, evidence_json = '', scores_json = 'null', \
         risk_flags_json = NULL, explainability_json = ' ' WHERE item_id = 'a'",
        [],
    )
    .unwrap();
    drop(raw);

    let listed = store.list_intel_items_for_run(&RunId::new("r1")).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].item, item("a", "r1"));
}

#[test]
fn corrupt_container_fails_listing_with_item_id() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let store = open_store(&dir);
    store.upsert_intel_items_batch(&[item("a", "r1"), item("b", "r1")]).unwrap();

    let raw = Connection::open(&path).unwrap();
    raw.execute(
        "UPDATE intel_items SET scores_json = ?1 WHERE item_id = 'b'",
        params!["{not json"],
    )
    .unwrap();
    drop(raw);

    let err = store.list_intel_items_for_run(&RunId::new("r1")).unwrap_err();
    match err {
        SqliteStoreError::Corrupt {
            record_id,
            message,
        } => {
            assert_eq!(record_id, "b");
            assert!(message.starts_with("scores_json"), "message: {message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn corrupt_run_status_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let store = open_store(&dir);
    store.start_run(&RunId::new("r1"), "daily", &json!({})).unwrap();

    let raw = Connection::open(&path).unwrap();
    raw.execute("UPDATE runs SET status = 'paused' WHERE run_id = 'r1'", []).unwrap();
    drop(raw);

    let err = store.get_run(&RunId::new("r1")).unwrap_err();
    assert!(matches!(err, SqliteStoreError::Corrupt { record_id, .. } if record_id == "r1"));
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn batch_is_all_or_nothing(count in 1_usize .. 12, invalid_at in proptest::option::of(0_usize .. 12)) {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let mut items: Vec<IntelItem> =
            (0 .. count).map(|index| item(&format!("item-{index:02}"), "r1")).collect();
        let poisoned = invalid_at.filter(|index| *index < count);
        if let Some(index) = poisoned {
            items[index].item_type = String::new();
        }

        let result = store.upsert_intel_items_batch(&items);
        let stored = item_ids(&store, "r1");
        if poisoned.is_some() {
            prop_assert!(result.is_err());
            prop_assert!(stored.is_empty());
        } else {
            prop_assert_eq!(result.unwrap(), count);
            prop_assert_eq!(stored.len(), count);
        }
    }
}
