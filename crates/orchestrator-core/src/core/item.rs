// crates/orchestrator-core/src/core/item.rs
// ============================================================================
// Module: Intel Item Records
// Description: Analyzed content records attached to runs.
// Purpose: Model items with explicit optional containers and boundary checks.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! An [`IntelItem`] is what the analysis side hands to storage. The five
//! container fields default to empty and are never null. [`IntelItem::validate`]
//! is the single boundary check run before an item is serialized; storage
//! assumes a validated item cannot fail to encode.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::ItemId;
use crate::core::identifiers::RunId;
use crate::core::time::UtcTimestamp;

// ============================================================================
// SECTION: Item Record
// ============================================================================

/// Analyzed content record supplied by the scoring side.
///
/// # Invariants
/// - `item_id`, `run_id`, `item_type`, `title`, and `summary` are required;
///   [`IntelItem::validate`] rejects blank values.
/// - Container fields default to empty when absent from input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelItem {
    /// Item identifier (upsert key).
    pub item_id: ItemId,
    /// Owning run; a logical reference only.
    pub run_id: RunId,
    /// Item category (for example `article`).
    pub item_type: String,
    /// Headline.
    pub title: String,
    /// Short summary.
    pub summary: String,
    /// Extracted claims, in order.
    #[serde(default)]
    pub claims: Vec<String>,
    /// Supporting evidence entries, in order.
    #[serde(default)]
    pub evidence: Vec<Value>,
    /// Named scores.
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    /// Risk flags, in order.
    #[serde(default)]
    pub risk_flags: Vec<String>,
    /// Human-readable scoring explanations, in order.
    #[serde(default)]
    pub explainability: Vec<String>,
    /// Gate decision label.
    #[serde(default)]
    pub decision: Option<String>,
    /// Reason attached to the decision.
    #[serde(default)]
    pub decision_reason: Option<String>,
}

impl IntelItem {
    /// Creates an item with the required fields and empty containers.
    #[must_use]
    pub fn new(
        item_id: impl Into<String>,
        run_id: impl Into<String>,
        item_type: impl Into<String>,
        title: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            item_id: ItemId::new(item_id),
            run_id: RunId::new(run_id),
            item_type: item_type.into(),
            title: title.into(),
            summary: summary.into(),
            claims: Vec::new(),
            evidence: Vec::new(),
            scores: BTreeMap::new(),
            risk_flags: Vec::new(),
            explainability: Vec::new(),
            decision: None,
            decision_reason: None,
        }
    }

    /// Checks required fields and score values.
    ///
    /// # Errors
    ///
    /// Returns [`ItemValidationError`] when a required field is blank or a
    /// score is not a finite number.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        let required = [
            ("item_id", self.item_id.as_str()),
            ("run_id", self.run_id.as_str()),
            ("item_type", self.item_type.as_str()),
            ("title", self.title.as_str()),
            ("summary", self.summary.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ItemValidationError::MissingField {
                    item_id: self.item_id.to_string(),
                    field,
                });
            }
        }
        if let Some((name, _)) = self.scores.iter().find(|(_, score)| !score.is_finite()) {
            return Err(ItemValidationError::NonFiniteScore {
                item_id: self.item_id.to_string(),
                score: name.clone(),
            });
        }
        Ok(())
    }
}

/// Item as read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredIntelItem {
    /// Stored item fields.
    #[serde(flatten)]
    pub item: IntelItem,
    /// Time the item id was first written.
    pub created_at: UtcTimestamp,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Item validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemValidationError {
    /// A required field is blank.
    #[error("intel item {item_id:?} missing required field {field}")]
    MissingField {
        /// Offending item identifier (may itself be blank).
        item_id: String,
        /// Name of the missing field.
        field: &'static str,
    },
    /// A score is NaN or infinite and cannot be stored as JSON.
    #[error("intel item {item_id:?} has non-finite score {score}")]
    NonFiniteScore {
        /// Offending item identifier.
        item_id: String,
        /// Name of the offending score.
        score: String,
    },
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use serde_json::json;

    use super::IntelItem;
    use super::ItemValidationError;

    #[test]
    fn deserialize_defaults_missing_containers() {
        let item: IntelItem = serde_json::from_value(json!({
            "item_id": "item-1",
            "run_id": "r1",
            "item_type": "article",
            "title": "Strike vote",
            "summary": "Union authorizes strike",
        }))
        .unwrap();
        assert!(item.claims.is_empty());
        assert!(item.evidence.is_empty());
        assert!(item.scores.is_empty());
        assert!(item.risk_flags.is_empty());
        assert!(item.explainability.is_empty());
        assert_eq!(item.decision, None);
        item.validate().unwrap();
    }

    #[test]
    fn validate_rejects_blank_title() {
        let item = IntelItem::new("item-2", "r1", "article", "  ", "summary");
        assert_eq!(
            item.validate(),
            Err(ItemValidationError::MissingField {
                item_id: "item-2".to_string(),
                field: "title",
            })
        );
    }

    #[test]
    fn validate_rejects_non_finite_scores() {
        let mut item = IntelItem::new("item-3", "r1", "article", "title", "summary");
        item.scores.insert("impact".to_string(), f64::NAN);
        assert!(matches!(item.validate(), Err(ItemValidationError::NonFiniteScore { .. })));
    }
}
