// crates/orchestrator-core/src/core/mod.rs
// ============================================================================
// Module: Orchestrator Core Model
// Description: Identifier, record, and time types for persisted workflow data.
// Purpose: Group the record model consumed by storage backends.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! Record model for runs and intel items. Storage backends translate these
//! types to and from their own representation; nothing here touches I/O.

pub mod identifiers;
pub mod item;
pub mod run;
pub mod time;
