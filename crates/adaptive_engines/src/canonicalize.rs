#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use adaptive_kernel_contracts::canonical::{CanonicalEvent, MetaValue};
use adaptive_kernel_contracts::common::validate_utc_timestamp;
use adaptive_kernel_contracts::{AdaptiveRefuse, ReasonId};
use serde_json::{Map, Value};

pub const REQUIRED_EVENT_FIELDS: [&str; 7] = [
    "source_layer",
    "event_type",
    "severity",
    "timestamp",
    "correlation_id",
    "meta",
    "reason_id",
];

pub fn canonicalize_event_str(text: &str) -> Result<CanonicalEvent, AdaptiveRefuse> {
    let raw: Value = serde_json::from_str(text).map_err(|err| {
        refuse(
            ReasonId::AcV3InvalidEvent,
            format!("observation is not valid JSON: {err}"),
        )
    })?;
    canonicalize_event(&raw)
}

/// Validates a raw observation and turns it into a [`CanonicalEvent`].
///
/// Each failure class maps to its own reason id: missing key, wrong JSON type,
/// bad timestamp, bad `meta`, and anything else that is well-typed but not in
/// canonical shape (unknown keys, blank identifiers, severity outside [0,1]).
pub fn canonicalize_event(raw: &Value) -> Result<CanonicalEvent, AdaptiveRefuse> {
    let obj = raw.as_object().ok_or_else(|| {
        refuse(
            ReasonId::AcV3InvalidEvent,
            "observation must be a JSON object",
        )
    })?;

    for field in REQUIRED_EVENT_FIELDS {
        if !obj.contains_key(field) {
            return Err(refuse(
                ReasonId::AcV3MissingField,
                format!("missing field {field}"),
            ));
        }
    }

    let source_layer = required_identifier(obj, "source_layer")?;
    let event_type = required_identifier(obj, "event_type")?;
    let severity = required_severity(obj)?;
    let timestamp = required_timestamp(obj, "timestamp")?;
    let correlation_id = required_identifier(obj, "correlation_id")?;
    let meta = required_meta(obj)?;
    let reason_id = required_identifier(obj, "reason_id")?;

    if let Some(extra) = obj
        .keys()
        .find(|key| !REQUIRED_EVENT_FIELDS.contains(&key.as_str()))
    {
        return Err(refuse(
            ReasonId::AcV3NonCanonical,
            format!("unknown field {extra}"),
        ));
    }

    CanonicalEvent::v1(
        source_layer,
        event_type,
        severity,
        timestamp,
        correlation_id,
        meta,
        reason_id,
    )
    .map_err(|violation| AdaptiveRefuse::from_violation(ReasonId::AcV3NonCanonical, &violation))
}

/// The raw form of an already canonical event. Feeding it back through
/// [`canonicalize_event`] reproduces the same `content_hash`.
pub fn event_to_raw(event: &CanonicalEvent) -> Value {
    event.hash_payload()
}

pub(crate) fn required_str<'a>(
    obj: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a str, AdaptiveRefuse> {
    match obj.get(field) {
        None => Err(refuse(
            ReasonId::AcV3MissingField,
            format!("missing field {field}"),
        )),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(refuse(
            ReasonId::AcV3TypeInvalid,
            format!("{field} must be a string"),
        )),
    }
}

pub(crate) fn required_timestamp(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<String, AdaptiveRefuse> {
    let value = required_str(obj, field)?;
    validate_utc_timestamp(field, value).map_err(|violation| {
        AdaptiveRefuse::from_violation(ReasonId::AcV3TimestampInvalid, &violation)
    })?;
    Ok(value.to_string())
}

fn required_identifier(obj: &Map<String, Value>, field: &str) -> Result<String, AdaptiveRefuse> {
    let value = required_str(obj, field)?;
    if value.trim().is_empty() {
        return Err(refuse(
            ReasonId::AcV3NonCanonical,
            format!("{field} must not be blank"),
        ));
    }
    Ok(value.to_string())
}

fn required_severity(obj: &Map<String, Value>) -> Result<f64, AdaptiveRefuse> {
    let severity = match obj.get("severity") {
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| {
            refuse(
                ReasonId::AcV3TypeInvalid,
                "severity must be representable as a float",
            )
        })?,
        Some(_) => {
            return Err(refuse(
                ReasonId::AcV3TypeInvalid,
                "severity must be a number",
            ))
        }
        None => {
            return Err(refuse(
                ReasonId::AcV3MissingField,
                "missing field severity",
            ))
        }
    };
    if !severity.is_finite() || !(0.0..=1.0).contains(&severity) {
        return Err(refuse(
            ReasonId::AcV3NonCanonical,
            format!("severity {severity} outside [0,1]"),
        ));
    }
    Ok(severity)
}

fn required_meta(obj: &Map<String, Value>) -> Result<BTreeMap<String, MetaValue>, AdaptiveRefuse> {
    let raw_meta = match obj.get("meta") {
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(refuse(
                ReasonId::AcV3MetaInvalid,
                "meta must be a JSON object",
            ))
        }
        None => return Err(refuse(ReasonId::AcV3MissingField, "missing field meta")),
    };

    let mut meta = BTreeMap::new();
    for (key, value) in raw_meta {
        if key.is_empty() {
            return Err(refuse(ReasonId::AcV3MetaInvalid, "meta keys must be non-empty"));
        }
        let scalar = match value {
            Value::Null => MetaValue::Null,
            Value::Bool(b) => MetaValue::Bool(*b),
            Value::String(s) => MetaValue::Text(s.clone()),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    MetaValue::Int(i)
                } else if n.is_f64() {
                    match n.as_f64() {
                        Some(f) if f.is_finite() => MetaValue::Float(f),
                        _ => {
                            return Err(refuse(
                                ReasonId::AcV3MetaInvalid,
                                format!("meta.{key} must be finite"),
                            ))
                        }
                    }
                } else {
                    return Err(refuse(
                        ReasonId::AcV3MetaInvalid,
                        format!("meta.{key} integer out of range"),
                    ));
                }
            }
            Value::Array(_) | Value::Object(_) => {
                return Err(refuse(
                    ReasonId::AcV3MetaInvalid,
                    format!("meta.{key} must be a scalar"),
                ))
            }
        };
        meta.insert(key.clone(), scalar);
    }
    Ok(meta)
}

pub(crate) fn refuse(reason_id: ReasonId, message: impl Into<String>) -> AdaptiveRefuse {
    let out = AdaptiveRefuse::new(reason_id, message);
    tracing::warn!(reason_id = out.reason_id.as_str(), message = %out.message, "fail-closed refusal");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw() -> Value {
        json!({
            "source_layer": "dqsn",
            "event_type": "reject",
            "severity": 0.4,
            "timestamp": "2026-01-14T00:00:00Z",
            "correlation_id": "c1",
            "meta": {"height": 812345, "peer": "10.0.0.7", "score": 0.25, "flag": true, "note": null},
            "reason_id": "R1",
        })
    }

    fn with(field: &str, value: Value) -> Value {
        let mut raw = raw();
        raw.as_object_mut().unwrap().insert(field.to_string(), value);
        raw
    }

    fn without(field: &str) -> Value {
        let mut raw = raw();
        raw.as_object_mut().unwrap().remove(field);
        raw
    }

    fn reason_of(raw: &Value) -> ReasonId {
        canonicalize_event(raw).unwrap_err().reason_id
    }

    #[test]
    fn at_canon_01_valid_event_is_canonicalized_and_hashed() {
        let event = canonicalize_event(&raw()).unwrap();
        assert_eq!(event.source_layer(), "dqsn");
        assert_eq!(event.meta().get("height"), Some(&MetaValue::Int(812345)));
        assert_eq!(event.meta().get("score"), Some(&MetaValue::Float(0.25)));
        assert_eq!(event.content_hash().len(), 64);
    }

    #[test]
    fn at_canon_02_recanonicalizing_canonical_form_keeps_hash() {
        let first = canonicalize_event(&raw()).unwrap();
        let second = canonicalize_event(&event_to_raw(&first)).unwrap();
        assert_eq!(first.content_hash(), second.content_hash());
        assert_eq!(first, second);
    }

    #[test]
    fn at_canon_03_integer_severity_normalizes_to_float() {
        let as_int = canonicalize_event(&with("severity", json!(1))).unwrap();
        let as_float = canonicalize_event(&with("severity", json!(1.0))).unwrap();
        assert_eq!(as_int.severity(), 1.0);
        assert_eq!(as_int.content_hash(), as_float.content_hash());
    }

    #[test]
    fn at_canon_04_each_failure_class_has_its_own_reason() {
        assert_eq!(reason_of(&json!(["nope"])), ReasonId::AcV3InvalidEvent);
        assert_eq!(reason_of(&without("reason_id")), ReasonId::AcV3MissingField);
        assert_eq!(reason_of(&with("source_layer", json!(7))), ReasonId::AcV3TypeInvalid);
        assert_eq!(reason_of(&with("severity", json!("0.4"))), ReasonId::AcV3TypeInvalid);
        assert_eq!(reason_of(&with("severity", json!(true))), ReasonId::AcV3TypeInvalid);
        assert_eq!(reason_of(&with("timestamp", json!(17))), ReasonId::AcV3TypeInvalid);
        assert_eq!(
            reason_of(&with("timestamp", json!("2026-01-14T00:00:00"))),
            ReasonId::AcV3TimestampInvalid
        );
        assert_eq!(
            reason_of(&with("timestamp", json!("not-a-timeZ"))),
            ReasonId::AcV3TimestampInvalid
        );
        assert_eq!(reason_of(&with("meta", json!(["x"]))), ReasonId::AcV3MetaInvalid);
        assert_eq!(
            reason_of(&with("meta", json!({"nested": {"a": 1}}))),
            ReasonId::AcV3MetaInvalid
        );
        assert_eq!(reason_of(&with("meta", json!({"": 1}))), ReasonId::AcV3MetaInvalid);
        assert_eq!(reason_of(&with("severity", json!(1.5))), ReasonId::AcV3NonCanonical);
        assert_eq!(reason_of(&with("reason_id", json!("  "))), ReasonId::AcV3NonCanonical);
        assert_eq!(reason_of(&with("extra", json!(1))), ReasonId::AcV3NonCanonical);
    }

    #[test]
    fn at_canon_05_malformed_json_text_is_invalid_event() {
        let err = canonicalize_event_str("{not json").unwrap_err();
        assert_eq!(err.reason_id, ReasonId::AcV3InvalidEvent);
        assert!(err.to_string().starts_with("AC_V3_INVALID_EVENT"));
    }
}
