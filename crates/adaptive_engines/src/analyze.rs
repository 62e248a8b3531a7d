#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use adaptive_kernel_contracts::evidence::EvidenceSnapshot;
use adaptive_kernel_contracts::finding::{EvidenceValue, Finding};
use adaptive_kernel_contracts::guardrail::{amg, GuardrailId};
use adaptive_kernel_contracts::{AdaptiveRefuse, ReasonId};

pub const REASON_SPIKE_FINDING_PREFIX: &str = "AC-FIND-REASON-SPIKE::";

/// Deny-by-default, fail-closed defaults, explicit reason codes, regression lock.
pub const REASON_SPIKE_GUARDRAILS: [GuardrailId; 4] = [amg(1), amg(11), amg(14), amg(21)];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzeConfig {
    pub reason_spike_min_count: u64,
    pub reason_spike_min_ratio: f64,
    pub reason_spike_base_severity: f64,
}

impl AnalyzeConfig {
    pub fn mvp_v1() -> Self {
        Self {
            reason_spike_min_count: 5,
            reason_spike_min_ratio: 0.10,
            reason_spike_base_severity: 0.20,
        }
    }
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

/// Reason-spike rule over a single store snapshot.
///
/// Keys are visited in ascending order, so equal snapshots give equal finding
/// lists in equal order.
pub fn generate_findings(
    snapshot: &EvidenceSnapshot,
    config: &AnalyzeConfig,
) -> Result<Vec<Finding>, AdaptiveRefuse> {
    let mut findings = Vec::new();
    if snapshot.total_events == 0 {
        return Ok(findings);
    }
    let total = snapshot.total_events as f64;

    for (reason_id, count) in snapshot.by_upstream_reason_id.iter() {
        let ratio = count as f64 / total;
        if count < config.reason_spike_min_count || ratio < config.reason_spike_min_ratio {
            continue;
        }

        let mut evidence = BTreeMap::new();
        evidence.insert("reason_id".to_string(), EvidenceValue::from(reason_id));
        evidence.insert("count".to_string(), EvidenceValue::from(count));
        evidence.insert(
            "total_events".to_string(),
            EvidenceValue::from(snapshot.total_events),
        );
        evidence.insert("ratio".to_string(), EvidenceValue::from(round6(ratio)));

        let finding = Finding::v1(
            format!("{REASON_SPIKE_FINDING_PREFIX}{reason_id}"),
            format!("Upstream reason code spike: {reason_id}"),
            (config.reason_spike_base_severity + ratio).clamp(0.0, 1.0),
            evidence,
            REASON_SPIKE_GUARDRAILS.into_iter().collect::<BTreeSet<_>>(),
        )
        .map_err(|violation| AdaptiveRefuse::from_violation(ReasonId::AcV3ReportInvalid, &violation))?;
        findings.push(finding);
    }

    tracing::debug!(
        total_events = snapshot.total_events,
        findings = findings.len(),
        "reason spike analysis complete"
    );
    Ok(findings)
}

pub(crate) fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
