// SPDX-FileCopyrightText: 2026 Apivault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types for credential records.
//!
//! The envelope produced by encryption travels through these types as an
//! opaque `String`; only the crypto layer encodes or decodes it. Everything
//! else (status, validity window, usage counters, audit trail) is plain data
//! persisted by the storage collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// Maximum byte length accepted for free-text metadata values.
pub const METADATA_VALUE_MAX_BYTES: usize = 1024;

/// Maximum byte length accepted for owner ids and key names.
pub const IDENTIFIER_MAX_BYTES: usize = 256;

/// The closed set of third-party services a credential may belong to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServiceKind {
    Openai,
    Anthropic,
    Unsplash,
    Custom,
}

/// Lifecycle state of a credential record.
///
/// `Revoked` is terminal: no transition leaves it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CredentialStatus {
    Active,
    Inactive,
    Expired,
    Revoked,
}

/// Validity window and rotation bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub rotation_reminder_at: Option<DateTime<Utc>>,
}

/// Consumption counters with a rolling daily window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    /// Number of tracked calls, ever.
    pub usage_count: u64,
    /// Units consumed across all calls, ever.
    pub total_units_consumed: u64,
    /// Units consumed in the current UTC calendar day.
    pub daily_used: u64,
    /// When the daily window rolls over (next UTC midnight).
    pub daily_reset_at: DateTime<Utc>,
    /// Advisory daily cap (None = unlimited).
    pub daily_limit: Option<u64>,
}

impl UsageCounters {
    /// Fresh counters with the daily window anchored at the next UTC midnight
    /// after `now`.
    pub fn new(now: DateTime<Utc>, daily_limit: Option<u64>) -> Self {
        Self {
            usage_count: 0,
            total_units_consumed: 0,
            daily_used: 0,
            daily_reset_at: next_utc_midnight(now),
            daily_limit,
        }
    }
}

/// Compute the next UTC calendar-day boundary strictly after `now`.
pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let next_day = now.date_naive().succ_opt().unwrap_or(now.date_naive());
    next_day
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now)
}

/// Audit trail fields. None of these ever contain secret material.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    pub created_from_address: Option<String>,
    pub last_used_from_address: Option<String>,
    pub last_validation_at: Option<DateTime<Utc>>,
    pub last_validation_error: Option<String>,
}

/// Closed tagged union of metadata kinds a caller may attach to a record.
///
/// Arbitrary key/value bags are deliberately not supported; unknown concerns
/// go through the bounded `Extension` kind and are validated at the API
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialMetadata {
    /// Deployment environment the key is scoped to ("production", "staging", ...).
    Environment { name: String },
    /// Billing attribution code.
    CostCenter { code: String },
    /// Free-text operator note.
    Note { text: String },
    /// Escape hatch for caller-defined data, bounded in size.
    Extension { label: String, value: String },
}

impl CredentialMetadata {
    /// Validate size bounds. Called at the API boundary before persisting.
    pub fn validate(&self) -> Result<(), VaultError> {
        let (field, len) = match self {
            CredentialMetadata::Environment { name } => ("environment name", name.len()),
            CredentialMetadata::CostCenter { code } => ("cost center code", code.len()),
            CredentialMetadata::Note { text } => ("note text", text.len()),
            CredentialMetadata::Extension { label, value } => {
                if label.is_empty() || label.len() > IDENTIFIER_MAX_BYTES {
                    return Err(VaultError::Validation(format!(
                        "extension label must be 1..={IDENTIFIER_MAX_BYTES} bytes"
                    )));
                }
                ("extension value", value.len())
            }
        };
        if len > METADATA_VALUE_MAX_BYTES {
            return Err(VaultError::Validation(format!(
                "{field} exceeds {METADATA_VALUE_MAX_BYTES} bytes"
            )));
        }
        Ok(())
    }
}

/// A stored credential. The `envelope` field is opaque outside the crypto
/// layer; `version` is the optimistic-concurrency token every mutation
/// compare-and-sets against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: String,
    pub owner_id: String,
    pub service: ServiceKind,
    pub key_name: String,
    pub envelope: String,
    pub status: CredentialStatus,
    pub version: u64,
    pub validity: Validity,
    pub usage: UsageCounters,
    pub audit: AuditInfo,
    pub metadata: Vec<CredentialMetadata>,
}

impl CredentialRecord {
    /// Whether `expires_at` has passed as of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.validity.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }
}

/// What `list_credentials` returns: everything about a record except its
/// plaintext and envelope internals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub id: String,
    pub service: ServiceKind,
    pub key_name: String,
    pub status: CredentialStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub daily_used: u64,
    pub daily_limit: Option<u64>,
    pub metadata: Vec<CredentialMetadata>,
}

impl From<&CredentialRecord> for CredentialSummary {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            id: record.id.clone(),
            service: record.service,
            key_name: record.key_name.clone(),
            status: record.status,
            created_at: record.validity.created_at,
            expires_at: record.validity.expires_at,
            usage_count: record.usage.usage_count,
            daily_used: record.usage.daily_used,
            daily_limit: record.usage.daily_limit,
            metadata: record.metadata.clone(),
        }
    }
}

/// Validate an owner id or key name at the API boundary.
pub fn validate_identifier(field: &str, value: &str) -> Result<(), VaultError> {
    if value.is_empty() {
        return Err(VaultError::Validation(format!("{field} must not be empty")));
    }
    if value.len() > IDENTIFIER_MAX_BYTES {
        return Err(VaultError::Validation(format!(
            "{field} exceeds {IDENTIFIER_MAX_BYTES} bytes"
        )));
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(VaultError::Validation(format!(
            "{field} contains control characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn next_utc_midnight_is_day_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        let midnight = next_utc_midnight(now);
        assert_eq!(
            midnight,
            Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn next_utc_midnight_at_exact_midnight_advances_a_full_day() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap();
        assert_eq!(
            next_utc_midnight(now),
            Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn service_kind_round_trips_through_strings() {
        use std::str::FromStr;
        for service in [
            ServiceKind::Openai,
            ServiceKind::Anthropic,
            ServiceKind::Unsplash,
            ServiceKind::Custom,
        ] {
            let text = service.to_string();
            assert_eq!(ServiceKind::from_str(&text).unwrap(), service);
        }
    }

    #[test]
    fn status_serializes_lowercase() {
        use std::str::FromStr;
        assert_eq!(CredentialStatus::Revoked.to_string(), "revoked");
        assert_eq!(
            CredentialStatus::from_str("expired").unwrap(),
            CredentialStatus::Expired
        );
    }

    #[test]
    fn metadata_validation_enforces_bounds() {
        let ok = CredentialMetadata::Note {
            text: "rotate quarterly".to_string(),
        };
        assert!(ok.validate().is_ok());

        let oversized = CredentialMetadata::Note {
            text: "x".repeat(METADATA_VALUE_MAX_BYTES + 1),
        };
        assert!(matches!(
            oversized.validate(),
            Err(VaultError::Validation(_))
        ));

        let unlabeled = CredentialMetadata::Extension {
            label: String::new(),
            value: "v".to_string(),
        };
        assert!(matches!(
            unlabeled.validate(),
            Err(VaultError::Validation(_))
        ));
    }

    #[test]
    fn identifier_validation_rejects_empty_and_control_chars() {
        assert!(validate_identifier("ownerId", "user-42").is_ok());
        assert!(validate_identifier("ownerId", "").is_err());
        assert!(validate_identifier("keyName", "bad\nname").is_err());
    }

    #[test]
    fn summary_never_includes_envelope() {
        let now = Utc::now();
        let record = CredentialRecord {
            id: "r1".to_string(),
            owner_id: "owner".to_string(),
            service: ServiceKind::Openai,
            key_name: "default".to_string(),
            envelope: "v2:opaque".to_string(),
            status: CredentialStatus::Active,
            version: 1,
            validity: Validity {
                created_at: now,
                expires_at: None,
                rotation_reminder_at: None,
            },
            usage: UsageCounters::new(now, Some(100)),
            audit: AuditInfo::default(),
            metadata: vec![],
        };
        let summary = CredentialSummary::from(&record);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("envelope"));
        assert!(!json.contains("opaque"));
    }
}
