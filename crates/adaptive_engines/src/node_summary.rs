#![forbid(unsafe_code)]

use adaptive_kernel_contracts::correlation::NodeSummaryEvent;
use adaptive_kernel_contracts::evidence::{CountMap, EvidenceSnapshot};
use adaptive_kernel_contracts::{AdaptiveRefuse, ReasonId};
use serde_json::{Map, Value};

use crate::canonicalize::{refuse, required_str, required_timestamp};

pub fn canonicalize_node_summary(raw: &Value) -> Result<NodeSummaryEvent, AdaptiveRefuse> {
    let obj = raw
        .as_object()
        .ok_or_else(|| refuse(ReasonId::AcV3InvalidEvent, "node summary must be a JSON object"))?;

    let node_id = required_str(obj, "node_id")?;
    if node_id.is_empty() {
        return Err(refuse(ReasonId::AcV3NonCanonical, "node_id must be non-empty"));
    }
    let window_start = required_timestamp(obj, "window_start")?;
    let window_end = required_timestamp(obj, "window_end")?;
    let total_events = required_count(obj.get("total_events"), "total_events")?;
    let by_upstream_reason_id = required_reason_counts(obj)?;

    NodeSummaryEvent::v1(
        node_id.to_string(),
        window_start,
        window_end,
        total_events,
        by_upstream_reason_id,
    )
    .map_err(|violation| AdaptiveRefuse::from_violation(ReasonId::AcV3NonCanonical, &violation))
}

/// Rolls a local evidence snapshot into the summary shape shipped to the
/// correlator. Only reason counts leave the node.
pub fn summarize_snapshot(
    node_id: &str,
    window_start: &str,
    window_end: &str,
    snapshot: &EvidenceSnapshot,
) -> Result<NodeSummaryEvent, AdaptiveRefuse> {
    NodeSummaryEvent::v1(
        node_id.to_string(),
        window_start.to_string(),
        window_end.to_string(),
        snapshot.total_events,
        snapshot.by_upstream_reason_id.clone(),
    )
    .map_err(|violation| AdaptiveRefuse::from_violation(ReasonId::AcV3NonCanonical, &violation))
}

fn required_count(value: Option<&Value>, field: &str) -> Result<u64, AdaptiveRefuse> {
    match value {
        None => Err(refuse(
            ReasonId::AcV3MissingField,
            format!("missing field {field}"),
        )),
        // Booleans are their own JSON type; they never count as integers.
        Some(Value::Bool(_)) => Err(refuse(
            ReasonId::AcV3TypeInvalid,
            format!("{field} must be an integer, not a boolean"),
        )),
        Some(Value::Number(n)) => {
            if let Some(count) = n.as_u64() {
                Ok(count)
            } else if n.as_i64().is_some() {
                Err(refuse(
                    ReasonId::AcV3NonCanonical,
                    format!("{field} must be >= 0"),
                ))
            } else {
                Err(refuse(
                    ReasonId::AcV3TypeInvalid,
                    format!("{field} must be an integer"),
                ))
            }
        }
        Some(_) => Err(refuse(
            ReasonId::AcV3TypeInvalid,
            format!("{field} must be an integer"),
        )),
    }
}

fn required_reason_counts(obj: &Map<String, Value>) -> Result<CountMap, AdaptiveRefuse> {
    let raw = match obj.get("by_upstream_reason_id") {
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(refuse(
                ReasonId::AcV3TypeInvalid,
                "by_upstream_reason_id must be an object",
            ))
        }
        None => {
            return Err(refuse(
                ReasonId::AcV3MissingField,
                "missing field by_upstream_reason_id",
            ))
        }
    };
    let mut counts = CountMap::new();
    for (reason_id, value) in raw {
        if reason_id.is_empty() {
            return Err(refuse(
                ReasonId::AcV3NonCanonical,
                "by_upstream_reason_id keys must be non-empty",
            ));
        }
        let count = required_count(Some(value), "by_upstream_reason_id value")?;
        counts.insert(reason_id.clone(), count);
    }
    Ok(counts)
}
