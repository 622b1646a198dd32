// crates/orchestrator-store-sqlite/src/codec.rs
// ============================================================================
// Module: Container Codec
// Description: JSON text encoding for variable-shaped record fields.
// Purpose: Translate item containers and run snapshots to and from columns.
// Dependencies: orchestrator-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Item containers are stored as JSON text, one column per field. Encoding
//! runs only on validated items and cannot fail for well-typed input. On
//! decode, SQL `NULL`, empty text, and the JSON literal `null` all yield the
//! field's empty default (`[]`, or `{}` for scores); any other undecodable
//! text fails with [`SqliteStoreError::Corrupt`] naming the row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use orchestrator_core::IntelItem;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::SqliteStoreError;

// ============================================================================
// SECTION: Fields
// ============================================================================

/// Container columns of the `intel_items` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContainerField {
    /// `claims_json`: sequence of strings.
    Claims,
    /// `evidence_json`: sequence of JSON values.
    Evidence,
    /// `scores_json`: mapping of name to number.
    Scores,
    /// `risk_flags_json`: sequence of strings.
    RiskFlags,
    /// `explainability_json`: sequence of strings.
    Explainability,
}

impl ContainerField {
    /// Returns the column name.
    pub(crate) const fn column(self) -> &'static str {
        match self {
            Self::Claims => "claims_json",
            Self::Evidence => "evidence_json",
            Self::Scores => "scores_json",
            Self::RiskFlags => "risk_flags_json",
            Self::Explainability => "explainability_json",
        }
    }
}

/// Container fields encoded as column text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EncodedContainers {
    /// Encoded claims.
    pub(crate) claims: String,
    /// Encoded evidence.
    pub(crate) evidence: String,
    /// Encoded scores.
    pub(crate) scores: String,
    /// Encoded risk flags.
    pub(crate) risk_flags: String,
    /// Encoded explainability entries.
    pub(crate) explainability: String,
}

impl EncodedContainers {
    /// Encodes the containers of a validated item.
    pub(crate) fn encode(item: &IntelItem) -> Result<Self, SqliteStoreError> {
        let item_id = item.item_id.as_str();
        Ok(Self {
            claims: encode_field(ContainerField::Claims, item_id, &item.claims)?,
            evidence: encode_field(ContainerField::Evidence, item_id, &item.evidence)?,
            scores: encode_field(ContainerField::Scores, item_id, &item.scores)?,
            risk_flags: encode_field(ContainerField::RiskFlags, item_id, &item.risk_flags)?,
            explainability: encode_field(
                ContainerField::Explainability,
                item_id,
                &item.explainability,
            )?,
        })
    }
}

/// Container column text as read from a row.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawContainers {
    /// Raw claims text.
    pub(crate) claims: Option<String>,
    /// Raw evidence text.
    pub(crate) evidence: Option<String>,
    /// Raw scores text.
    pub(crate) scores: Option<String>,
    /// Raw risk flags text.
    pub(crate) risk_flags: Option<String>,
    /// Raw explainability text.
    pub(crate) explainability: Option<String>,
}

/// Decoded container values.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct DecodedContainers {
    /// Claims.
    pub(crate) claims: Vec<String>,
    /// Evidence entries.
    pub(crate) evidence: Vec<Value>,
    /// Scores.
    pub(crate) scores: BTreeMap<String, f64>,
    /// Risk flags.
    pub(crate) risk_flags: Vec<String>,
    /// Explainability entries.
    pub(crate) explainability: Vec<String>,
}

impl RawContainers {
    /// Decodes every container, failing on the first corrupt column.
    pub(crate) fn decode(self, item_id: &str) -> Result<DecodedContainers, SqliteStoreError> {
        Ok(DecodedContainers {
            claims: decode_field(ContainerField::Claims, item_id, self.claims.as_deref())?,
            evidence: decode_field(ContainerField::Evidence, item_id, self.evidence.as_deref())?,
            scores: decode_field(ContainerField::Scores, item_id, self.scores.as_deref())?,
            risk_flags: decode_field(
                ContainerField::RiskFlags,
                item_id,
                self.risk_flags.as_deref(),
            )?,
            explainability: decode_field(
                ContainerField::Explainability,
                item_id,
                self.explainability.as_deref(),
            )?,
        })
    }
}

// ============================================================================
// SECTION: Field Codec
// ============================================================================

/// Encodes one container field.
fn encode_field<T: Serialize>(
    field: ContainerField,
    item_id: &str,
    value: &T,
) -> Result<String, SqliteStoreError> {
    serde_json::to_string(value).map_err(|err| {
        SqliteStoreError::Validation(format!(
            "intel item {item_id:?} {} is not encodable: {err}",
            field.column()
        ))
    })
}

/// Decodes one container field, substituting the empty default.
fn decode_field<T: DeserializeOwned + Default>(
    field: ContainerField,
    item_id: &str,
    raw: Option<&str>,
) -> Result<T, SqliteStoreError> {
    let Some(text) = raw.map(str::trim).filter(|text| !text.is_empty()) else {
        return Ok(T::default());
    };
    let decoded: Option<T> =
        serde_json::from_str(text).map_err(|err| SqliteStoreError::Corrupt {
            record_id: item_id.to_string(),
            message: format!("{}: {err}", field.column()),
        })?;
    Ok(decoded.unwrap_or_default())
}

// ============================================================================
// SECTION: Opaque Values
// ============================================================================

/// Encodes an opaque JSON value (run settings, telemetry snapshots).
pub(crate) fn encode_value(value: &Value) -> Result<String, SqliteStoreError> {
    serde_json::to_string(value).map_err(|err| SqliteStoreError::Validation(err.to_string()))
}

/// Decodes an opaque JSON value written by [`encode_value`].
pub(crate) fn decode_value(
    record_id: &str,
    column: &str,
    text: &str,
) -> Result<Value, SqliteStoreError> {
    serde_json::from_str(text).map_err(|err| SqliteStoreError::Corrupt {
        record_id: record_id.to_string(),
        message: format!("{column}: {err}"),
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
