// crates/orchestrator-core/src/core/run.rs
// ============================================================================
// Module: Run Records
// Description: Run lifecycle status and the persisted run record.
// Purpose: Model a top-level unit of work grouping analyzed items.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A run starts in [`RunStatus::Running`] and moves to exactly one terminal
//! status when finished. The record carries an opaque settings snapshot
//! captured when the run started.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::RunId;
use crate::core::time::UtcTimestamp;

// ============================================================================
// SECTION: Status
// ============================================================================

/// Lifecycle status of a run.
///
/// # Invariants
/// - Labels are stable; they are the persisted form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is in progress.
    Running,
    /// Run finished successfully.
    Completed,
    /// Run failed.
    Failed,
    /// Run finished with only part of its work done.
    Partial,
}

impl RunStatus {
    /// Returns the persisted label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Partial => "partial",
        }
    }

    /// Parses a persisted status label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }

    /// Returns true for statuses that end a run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

// ============================================================================
// SECTION: Run Record
// ============================================================================

/// Persisted run record.
///
/// # Invariants
/// - `finished_at` is `Some` exactly when `status` is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Run identifier.
    pub run_id: RunId,
    /// Caller-defined run category (for example `daily`).
    pub run_type: String,
    /// Settings captured when the run started.
    pub settings_snapshot: Value,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Start time.
    pub started_at: UtcTimestamp,
    /// Finish time, set by the terminal transition.
    pub finished_at: Option<UtcTimestamp>,
    /// Optional reason recorded with the terminal transition.
    pub finish_reason: Option<String>,
}

impl Run {
    /// Returns true when the run has reached a terminal status.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
