// crates/orchestrator-config/src/lib.rs
// ============================================================================
// Module: Brand Orchestrator Config
// Description: Configuration loading for the orchestrator persistence layer.
// Purpose: Supply store and telemetry settings as validated, immutable input.
// Dependencies: orchestrator-core, orchestrator-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Loads `brand-orchestrator.toml`, validates it fail-closed, and exposes the
//! store settings, the telemetry capacity, and the run settings snapshot.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ConfigError;
pub use config::LogLevel;
pub use config::OrchestratorConfig;
pub use config::TelemetryConfig;
