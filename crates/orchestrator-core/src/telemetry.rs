// crates/orchestrator-core/src/telemetry.rs
// ============================================================================
// Module: Orchestrator Telemetry
// Description: Bounded in-memory registry of named operational metrics.
// Purpose: Record counters without unbounded growth across long processes.
// Dependencies: serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! [`TelemetryStore`] keeps the latest value per metric name with the time it
//! was written. Capacity is fixed at construction. Recording a new name while
//! full first evicts the name that was inserted earliest; updates to an
//! existing name keep its original insertion position. Eviction pops the
//! front of an insertion-order queue paired with a hash index, so it costs
//! O(1) regardless of capacity.
//!
//! All access goes through one mutex. Reads return owned copies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default registry capacity.
pub const DEFAULT_MAX_METRICS: usize = 10_000;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Latest recorded value for a metric name.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEntry {
    /// Metric name.
    pub name: String,
    /// Opaque metric value.
    pub value: Value,
    /// Time of the most recent write for this name.
    pub timestamp: OffsetDateTime,
}

/// Telemetry registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryError {
    /// Capacity must be at least one entry.
    #[error("telemetry capacity must be greater than zero")]
    ZeroCapacity,
}

/// Registry state guarded by the store mutex.
///
/// # Invariants
/// - `order` holds exactly the keys of `entries`, oldest insertion first.
#[derive(Debug, Default)]
struct MetricRegistry {
    /// Entries by name.
    entries: HashMap<String, MetricEntry>,
    /// Names in original insertion order.
    order: VecDeque<String>,
}

/// Fixed-capacity metric registry with insertion-order eviction.
///
/// # Invariants
/// - The number of entries never exceeds [`TelemetryStore::capacity`].
#[derive(Debug)]
pub struct TelemetryStore {
    /// Maximum number of distinct names retained.
    max_metrics: usize,
    /// Registry state.
    registry: Mutex<MetricRegistry>,
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self {
            max_metrics: DEFAULT_MAX_METRICS,
            registry: Mutex::new(MetricRegistry::default()),
        }
    }
}

impl TelemetryStore {
    /// Creates a registry with [`DEFAULT_MAX_METRICS`] capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding at most `max_metrics` names.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::ZeroCapacity`] when `max_metrics` is zero.
    pub fn with_capacity(max_metrics: usize) -> Result<Self, TelemetryError> {
        if max_metrics == 0 {
            return Err(TelemetryError::ZeroCapacity);
        }
        Ok(Self {
            max_metrics,
            registry: Mutex::new(MetricRegistry::default()),
        })
    }

    /// Returns the configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.max_metrics
    }

    /// Inserts or updates `name`, evicting the oldest name when full.
    pub fn record_metric(&self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let entry = MetricEntry {
            name: name.clone(),
            value: value.into(),
            timestamp: OffsetDateTime::now_utc(),
        };
        let mut registry = self.lock();
        if let Some(existing) = registry.entries.get_mut(&name) {
            *existing = entry;
            return;
        }
        if registry.entries.len() >= self.max_metrics
            && let Some(oldest) = registry.order.pop_front()
        {
            registry.entries.remove(&oldest);
        }
        registry.order.push_back(name.clone());
        registry.entries.insert(name, entry);
    }

    /// Returns a copy of the entry for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<MetricEntry> {
        self.lock().entries.get(name).cloned()
    }

    /// Returns an independent copy of every entry keyed by name.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, MetricEntry> {
        let registry = self.lock();
        registry.entries.iter().map(|(name, entry)| (name.clone(), entry.clone())).collect()
    }

    /// Returns entry names oldest insertion first.
    #[must_use]
    pub fn names_in_insertion_order(&self) -> Vec<String> {
        self.lock().order.iter().cloned().collect()
    }

    /// Renders the registry as a JSON object for persistence.
    ///
    /// Each name maps to `{"value": ..., "timestamp_unix_ms": ...}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let registry = self.lock();
        let mut object = Map::new();
        for (name, entry) in &registry.entries {
            let millis = entry.timestamp.unix_timestamp_nanos() / 1_000_000;
            let millis = i64::try_from(millis).unwrap_or(i64::MAX);
            object.insert(
                name.clone(),
                json!({ "value": entry.value, "timestamp_unix_ms": millis }),
            );
        }
        Value::Object(object)
    }

    /// Returns the number of retained names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true when no names are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let mut registry = self.lock();
        registry.entries.clear();
        registry.order.clear();
    }

    /// Locks the registry.
    ///
    /// A panic while holding the lock cannot leave `entries` and `order`
    /// disagreeing in a way later calls rely on, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, MetricRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
