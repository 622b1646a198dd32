// crates/orchestrator-core/tests/telemetry_bounds.rs
// ============================================================================
// Module: Telemetry Bounded Growth Tests
// Description: Property and concurrency tests for the telemetry registry.
// Purpose: Validate capacity limits, eviction order, and shared access.
// ============================================================================

//! ## Overview
//! Integration tests for [`TelemetryStore`] growth bounds:
//! - Recording `capacity + k` distinct names keeps exactly the latest
//!   `capacity` names and drops the `k` earliest
//! - Concurrent writers never push the registry past capacity

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::thread;

use orchestrator_core::TelemetryStore;
use proptest::prelude::*;

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn registry_keeps_most_recent_names(capacity in 1_usize .. 64, overflow in 0_usize .. 64) {
        let telemetry = TelemetryStore::with_capacity(capacity).unwrap();
        let total = capacity + overflow;
        for index in 0 .. total {
            telemetry.record_metric(format!("metric_{index}"), index);
        }
        let snapshot = telemetry.snapshot();
        prop_assert_eq!(snapshot.len(), capacity);
        for index in 0 .. overflow {
            let name = format!("metric_{index}");
            prop_assert!(!snapshot.contains_key(&name));
        }
        for index in overflow .. total {
            let name = format!("metric_{index}");
            prop_assert!(snapshot.contains_key(&name));
        }
    }

    #[test]
    fn updates_never_grow_registry(capacity in 1_usize .. 16, rounds in 1_usize .. 8) {
        let telemetry = TelemetryStore::with_capacity(capacity).unwrap();
        for round in 0 .. rounds {
            for index in 0 .. capacity {
                telemetry.record_metric(format!("metric_{index}"), round);
            }
        }
        prop_assert_eq!(telemetry.len(), capacity);
        let first = telemetry.names_in_insertion_order();
        prop_assert_eq!(first.first().map(String::as_str), Some("metric_0"));
    }
}

// ============================================================================
// SECTION: Concurrency
// ============================================================================

#[test]
fn default_capacity_bounds_large_workloads() {
    let telemetry = TelemetryStore::new();
    let capacity = telemetry.capacity();
    for index in 0 .. capacity + 150 {
        telemetry.record_metric(format!("metric_{index}"), index);
    }
    assert_eq!(telemetry.len(), capacity);
    assert!(telemetry.get("metric_0").is_none());
    assert!(telemetry.get("metric_149").is_none());
    assert!(telemetry.get("metric_150").is_some());
    assert!(telemetry.get(&format!("metric_{}", capacity + 149)).is_some());
}

#[test]
fn concurrent_writers_respect_capacity() {
    let telemetry = Arc::new(TelemetryStore::with_capacity(100).unwrap());
    let mut handles = Vec::new();
    for worker in 0 .. 8 {
        let telemetry = Arc::clone(&telemetry);
        handles.push(thread::spawn(move || {
            for index in 0 .. 200 {
                telemetry.record_metric(format!("worker_{worker}_metric_{index}"), index);
                assert!(telemetry.len() <= 100);
            }
        }));
    }
    for handle in handles {
        handle.join().expect("telemetry worker panicked");
    }
    assert_eq!(telemetry.len(), 100);
    assert_eq!(telemetry.names_in_insertion_order().len(), 100);
}
