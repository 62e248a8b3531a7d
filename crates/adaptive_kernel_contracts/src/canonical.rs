#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;

use crate::canonical_json::{sha256_hex, to_canonical_json};
use crate::common::{validate_non_blank, validate_unit_interval, validate_utc_timestamp};
use crate::{ContractViolation, Validate};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Validate for MetaValue {
    fn validate(&self) -> Result<(), ContractViolation> {
        if let MetaValue::Float(v) = self {
            if !v.is_finite() {
                return Err(ContractViolation::NotFinite {
                    field: "canonical_event.meta",
                });
            }
        }
        Ok(())
    }
}

/// One normalized upstream observation.
///
/// Fields are private: the only way to obtain a value is [`CanonicalEvent::v1`],
/// which validates every field and derives `content_hash` from the rest. A hash
/// therefore always describes exactly the fields it travels with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalEvent {
    source_layer: String,
    event_type: String,
    severity: f64,
    timestamp: String,
    correlation_id: String,
    meta: BTreeMap<String, MetaValue>,
    reason_id: String,
    content_hash: String,
}

impl CanonicalEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        source_layer: String,
        event_type: String,
        severity: f64,
        timestamp: String,
        correlation_id: String,
        meta: BTreeMap<String, MetaValue>,
        reason_id: String,
    ) -> Result<Self, ContractViolation> {
        let mut event = Self {
            source_layer,
            event_type,
            severity,
            timestamp,
            correlation_id,
            meta,
            reason_id,
            content_hash: String::new(),
        };
        event.validate_fields()?;
        event.content_hash = event.compute_content_hash()?;
        Ok(event)
    }

    pub fn source_layer(&self) -> &str {
        &self.source_layer
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn severity(&self) -> f64 {
        self.severity
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn meta(&self) -> &BTreeMap<String, MetaValue> {
        &self.meta
    }

    pub fn reason_id(&self) -> &str {
        &self.reason_id
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// The hashed projection: every field except `content_hash`.
    pub fn hash_payload(&self) -> serde_json::Value {
        json!({
            "source_layer": self.source_layer,
            "event_type": self.event_type,
            "severity": self.severity,
            "timestamp": self.timestamp,
            "correlation_id": self.correlation_id,
            "meta": self.meta,
            "reason_id": self.reason_id,
        })
    }

    fn compute_content_hash(&self) -> Result<String, ContractViolation> {
        let text = to_canonical_json(&self.hash_payload()).map_err(|_| {
            ContractViolation::InvalidValue {
                field: "canonical_event",
                reason: "must serialize to canonical JSON",
            }
        })?;
        Ok(sha256_hex(&text))
    }

    fn validate_fields(&self) -> Result<(), ContractViolation> {
        validate_non_blank("canonical_event.source_layer", &self.source_layer)?;
        validate_non_blank("canonical_event.event_type", &self.event_type)?;
        validate_unit_interval("canonical_event.severity", self.severity)?;
        validate_utc_timestamp("canonical_event.timestamp", &self.timestamp)?;
        validate_non_blank("canonical_event.correlation_id", &self.correlation_id)?;
        validate_non_blank("canonical_event.reason_id", &self.reason_id)?;
        for (key, value) in &self.meta {
            if key.is_empty() {
                return Err(ContractViolation::InvalidValue {
                    field: "canonical_event.meta",
                    reason: "keys must be non-empty",
                });
            }
            value.validate()?;
        }
        Ok(())
    }
}

impl Validate for CanonicalEvent {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.validate_fields()?;
        if self.compute_content_hash()? != self.content_hash {
            return Err(ContractViolation::InvalidValue {
                field: "canonical_event.content_hash",
                reason: "must match the hash of the canonical fields",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(meta: BTreeMap<String, MetaValue>) -> CanonicalEvent {
        CanonicalEvent::v1(
            "dqsn".to_string(),
            "reject".to_string(),
            0.4,
            "2026-01-14T00:00:00Z".to_string(),
            "c1".to_string(),
            meta,
            "R1".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn at_event_01_hash_independent_of_meta_insertion_order() {
        let mut a = BTreeMap::new();
        a.insert("zeta".to_string(), MetaValue::Int(1));
        a.insert("alpha".to_string(), MetaValue::Text("x".to_string()));
        let mut b = BTreeMap::new();
        b.insert("alpha".to_string(), MetaValue::Text("x".to_string()));
        b.insert("zeta".to_string(), MetaValue::Int(1));

        let ea = event(a);
        let eb = event(b);
        assert_eq!(ea.content_hash(), eb.content_hash());
        assert_eq!(ea.content_hash().len(), 64);
        assert!(ea.validate().is_ok());
    }

    #[test]
    fn at_event_02_hash_tracks_field_changes() {
        let base = event(BTreeMap::new());
        let other = CanonicalEvent::v1(
            "dqsn".to_string(),
            "reject".to_string(),
            0.4,
            "2026-01-14T00:00:00Z".to_string(),
            "c2".to_string(),
            BTreeMap::new(),
            "R1".to_string(),
        )
        .unwrap();
        assert_ne!(base.content_hash(), other.content_hash());
    }

    #[test]
    fn at_event_03_rejects_out_of_range_severity_and_blank_fields() {
        let out_of_range = CanonicalEvent::v1(
            "dqsn".to_string(),
            "reject".to_string(),
            1.5,
            "2026-01-14T00:00:00Z".to_string(),
            "c1".to_string(),
            BTreeMap::new(),
            "R1".to_string(),
        );
        assert!(matches!(
            out_of_range,
            Err(ContractViolation::InvalidRange { .. })
        ));

        let blank_layer = CanonicalEvent::v1(
            "  ".to_string(),
            "reject".to_string(),
            0.1,
            "2026-01-14T00:00:00Z".to_string(),
            "c1".to_string(),
            BTreeMap::new(),
            "R1".to_string(),
        );
        assert!(blank_layer.is_err());
    }
}
