// crates/orchestrator-core/src/lib.rs
// ============================================================================
// Module: Brand Orchestrator Core
// Description: Domain records shared by the orchestrator persistence layer.
// Purpose: Define runs, intel items, timestamps, and the telemetry registry.
// Dependencies: serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! `orchestrator-core` holds the backend-agnostic pieces of the orchestrator
//! persistence layer: strongly typed identifiers, the [`Run`] and
//! [`IntelItem`] records with boundary validation, fixed-width UTC
//! timestamps, and the bounded in-memory [`TelemetryStore`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::identifiers::ItemId;
pub use crate::core::identifiers::RunId;
pub use crate::core::item::IntelItem;
pub use crate::core::item::ItemValidationError;
pub use crate::core::item::StoredIntelItem;
pub use crate::core::run::Run;
pub use crate::core::run::RunStatus;
pub use crate::core::time::MonotonicClock;
pub use crate::core::time::UtcTimestamp;
pub use crate::telemetry::DEFAULT_MAX_METRICS;
pub use crate::telemetry::MetricEntry;
pub use crate::telemetry::TelemetryError;
pub use crate::telemetry::TelemetryStore;
