#![forbid(unsafe_code)]

use std::fmt;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Stable, enumerable failure classes. The string form is the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonId {
    AcV3InvalidEvent,
    AcV3MissingField,
    AcV3TypeInvalid,
    AcV3TimestampInvalid,
    AcV3MetaInvalid,
    AcV3NonCanonical,
    AcV3GuardrailUnknown,
    AcV3GuardrailRegistryInvalid,
    AcV3ConfWeightsInvalid,
    AcV3ReportInvalid,
}

impl ReasonId {
    pub const ALL: [ReasonId; 10] = [
        ReasonId::AcV3InvalidEvent,
        ReasonId::AcV3MissingField,
        ReasonId::AcV3TypeInvalid,
        ReasonId::AcV3TimestampInvalid,
        ReasonId::AcV3MetaInvalid,
        ReasonId::AcV3NonCanonical,
        ReasonId::AcV3GuardrailUnknown,
        ReasonId::AcV3GuardrailRegistryInvalid,
        ReasonId::AcV3ConfWeightsInvalid,
        ReasonId::AcV3ReportInvalid,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReasonId::AcV3InvalidEvent => "AC_V3_INVALID_EVENT",
            ReasonId::AcV3MissingField => "AC_V3_MISSING_FIELD",
            ReasonId::AcV3TypeInvalid => "AC_V3_TYPE_INVALID",
            ReasonId::AcV3TimestampInvalid => "AC_V3_TIMESTAMP_INVALID",
            ReasonId::AcV3MetaInvalid => "AC_V3_META_INVALID",
            ReasonId::AcV3NonCanonical => "AC_V3_NON_CANONICAL",
            ReasonId::AcV3GuardrailUnknown => "AC_V3_GUARDRAIL_UNKNOWN",
            ReasonId::AcV3GuardrailRegistryInvalid => "AC_V3_GUARDRAIL_REGISTRY_INVALID",
            ReasonId::AcV3ConfWeightsInvalid => "AC_V3_CONF_WEIGHTS_INVALID",
            ReasonId::AcV3ReportInvalid => "AC_V3_REPORT_INVALID",
        }
    }
}

impl fmt::Display for ReasonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContractViolation {
    #[error("{field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
    #[error("{field}: {got} outside {min}..={max}")]
    InvalidRange {
        field: &'static str,
        min: f64,
        max: f64,
        got: f64,
    },
    #[error("{field}: must be finite")]
    NotFinite { field: &'static str },
}

impl ContractViolation {
    pub fn field(&self) -> &'static str {
        match self {
            ContractViolation::InvalidValue { field, .. }
            | ContractViolation::InvalidRange { field, .. }
            | ContractViolation::NotFinite { field } => field,
        }
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}

/// Fail-closed rejection carried out of every pipeline stage.
///
/// `Display` always leads with the stable reason id so callers matching on text
/// still see the enumerable code first.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason_id}: {message}")]
pub struct AdaptiveRefuse {
    pub reason_id: ReasonId,
    pub message: String,
}

impl AdaptiveRefuse {
    pub fn new(reason_id: ReasonId, message: impl Into<String>) -> Self {
        Self {
            reason_id,
            message: message.into(),
        }
    }

    pub fn from_violation(reason_id: ReasonId, violation: &ContractViolation) -> Self {
        Self::new(reason_id, violation.to_string())
    }
}

pub fn validate_non_blank(field: &'static str, value: &str) -> Result<(), ContractViolation> {
    if value.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be blank",
        });
    }
    Ok(())
}

pub fn validate_unit_interval(field: &'static str, value: f64) -> Result<(), ContractViolation> {
    if !value.is_finite() {
        return Err(ContractViolation::NotFinite { field });
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(ContractViolation::InvalidRange {
            field,
            min: 0.0,
            max: 1.0,
            got: value,
        });
    }
    Ok(())
}

/// Accepts RFC 3339 instants written in UTC with a literal `Z` suffix.
pub fn validate_utc_timestamp(field: &'static str, value: &str) -> Result<(), ContractViolation> {
    if !value.ends_with('Z') {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be UTC ISO-8601 ending in Z",
        });
    }
    if DateTime::parse_from_rfc3339(value).is_err() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must parse as an RFC 3339 instant",
        });
    }
    Ok(())
}
