#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use adaptive_kernel_contracts::correlation::{CorrelationSnapshot, NodeSummaryEvent};
use adaptive_kernel_contracts::finding::{EvidenceValue, Finding};
use adaptive_kernel_contracts::guardrail::{amg, GuardrailId};
use adaptive_kernel_contracts::{AdaptiveRefuse, ReasonId};

use crate::analyze::round6;

pub const WIDESPREAD_FINDING_PREFIX: &str = "AC-CORR::REASON-WIDESPREAD::";

/// Deny-by-default, fail-closed defaults, observability without leakage,
/// privacy-preserving aggregation, no raw data centralization, strict summary
/// schemas.
pub const WIDESPREAD_GUARDRAILS: [GuardrailId; 6] =
    [amg(1), amg(11), amg(36), amg(61), amg(62), amg(63)];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationConfig {
    pub min_nodes: u64,
    pub min_nodes_ratio: f64,
}

impl CorrelationConfig {
    pub fn mvp_v1() -> Self {
        Self {
            min_nodes: 3,
            min_nodes_ratio: 0.50,
        }
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

pub fn aggregate_node_summaries<'a, I>(summaries: I) -> CorrelationSnapshot
where
    I: IntoIterator<Item = &'a NodeSummaryEvent>,
{
    let mut snapshot = CorrelationSnapshot::empty();
    for summary in summaries {
        snapshot.absorb(summary);
    }
    snapshot
}

/// One finding per reason id seen on enough nodes, in ascending reason order.
pub fn generate_correlation_findings(
    snapshot: &CorrelationSnapshot,
    config: &CorrelationConfig,
) -> Result<Vec<Finding>, AdaptiveRefuse> {
    let mut findings = Vec::new();
    if snapshot.total_nodes == 0 {
        return Ok(findings);
    }
    let total_nodes = snapshot.total_nodes as f64;

    for (reason_id, nodes) in snapshot.nodes_reporting_reason_id.iter() {
        let ratio = nodes as f64 / total_nodes;
        if nodes < config.min_nodes || ratio < config.min_nodes_ratio {
            continue;
        }

        let mut evidence = BTreeMap::new();
        evidence.insert("reason_id".to_string(), EvidenceValue::from(reason_id));
        evidence.insert("nodes_reporting".to_string(), EvidenceValue::from(nodes));
        evidence.insert(
            "total_nodes".to_string(),
            EvidenceValue::from(snapshot.total_nodes),
        );
        evidence.insert("nodes_ratio".to_string(), EvidenceValue::from(round6(ratio)));
        evidence.insert(
            "aggregated_count".to_string(),
            EvidenceValue::from(snapshot.by_upstream_reason_id.get(reason_id)),
        );

        let finding = Finding::v1(
            format!("{WIDESPREAD_FINDING_PREFIX}{reason_id}"),
            format!("Reason ID widespread across nodes: {reason_id}"),
            (0.3 + ratio).min(1.0),
            evidence,
            WIDESPREAD_GUARDRAILS.into_iter().collect::<BTreeSet<_>>(),
        )
        .map_err(|violation| AdaptiveRefuse::from_violation(ReasonId::AcV3ReportInvalid, &violation))?;
        findings.push(finding);
    }

    tracing::debug!(
        total_nodes = snapshot.total_nodes,
        findings = findings.len(),
        "correlation analysis complete"
    );
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptive_kernel_contracts::evidence::CountMap;
    use proptest::prelude::*;

    fn summary(node_id: &str, counts: &[(&str, u64)]) -> NodeSummaryEvent {
        NodeSummaryEvent::v1(
            node_id.to_string(),
            "2026-01-14T00:00:00Z".to_string(),
            "2026-01-14T01:00:00Z".to_string(),
            counts.iter().map(|(_, c)| *c).sum(),
            counts.iter().map(|(k, v)| (*k, *v)).collect::<CountMap>(),
        )
        .unwrap()
    }

    fn fleet() -> Vec<NodeSummaryEvent> {
        vec![
            summary("n1", &[("X", 4), ("Y", 1)]),
            summary("n2", &[("X", 1)]),
            summary("n3", &[("X", 2), ("Z", 0)]),
            summary("n4", &[("Y", 3)]),
        ]
    }

    #[test]
    fn at_corr_01_widespread_reason_emits_exactly_one_finding() {
        let snap = aggregate_node_summaries(&fleet());
        assert_eq!(snap.total_nodes, 4);
        assert_eq!(snap.total_events, 11);
        assert_eq!(snap.nodes_reporting_reason_id.get("X"), 3);
        assert_eq!(snap.by_upstream_reason_id.get("X"), 7);

        let findings = generate_correlation_findings(&snap, &CorrelationConfig::mvp_v1()).unwrap();
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.finding_id, "AC-CORR::REASON-WIDESPREAD::X");
        assert!((finding.severity - 1.0).abs() < 1e-12);
        assert_eq!(finding.evidence.get("nodes_ratio"), Some(&EvidenceValue::Ratio(0.75)));
        assert_eq!(finding.evidence.get("aggregated_count"), Some(&EvidenceValue::Count(7)));
        assert_eq!(finding.guardrails.len(), 6);
    }

    #[test]
    fn at_corr_02_zero_nodes_yields_nothing() {
        let snap = aggregate_node_summaries(Vec::<NodeSummaryEvent>::new().iter());
        assert_eq!(snap, CorrelationSnapshot::empty());
        assert!(generate_correlation_findings(&snap, &CorrelationConfig::mvp_v1())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn at_corr_03_ratio_gate_applies_even_with_enough_nodes() {
        let mut nodes = fleet();
        for i in 5..=8 {
            nodes.push(summary(&format!("n{i}"), &[("Q", 1)]));
        }
        // X: 3 of 8 nodes -> ratio 0.375 < 0.50
        let snap = aggregate_node_summaries(&nodes);
        let findings = generate_correlation_findings(&snap, &CorrelationConfig::mvp_v1()).unwrap();
        assert!(findings.iter().all(|f| !f.finding_id.ends_with("::X")));
        assert!(findings.iter().any(|f| f.finding_id.ends_with("::Q")));
    }

    proptest! {
        #[test]
        fn aggregate_is_permutation_invariant(
            counts in proptest::collection::vec(
                proptest::collection::vec((0usize..4, 0u64..5), 0..4),
                1..6,
            ),
            rotation in 0usize..6,
        ) {
            const REASONS: [&str; 4] = ["A", "B", "C", "D"];
            let summaries = counts
                .iter()
                .enumerate()
                .map(|(i, pairs)| {
                    let mut map = CountMap::new();
                    for (r, c) in pairs {
                        map.insert(REASONS[*r], *c);
                    }
                    NodeSummaryEvent::v1(
                        format!("n{i}"),
                        "2026-01-14T00:00:00Z".to_string(),
                        "2026-01-14T01:00:00Z".to_string(),
                        map.total(),
                        map,
                    )
                    .unwrap()
                })
                .collect::<Vec<_>>();

            let forward = aggregate_node_summaries(&summaries);
            let mut reversed = summaries.clone();
            reversed.reverse();
            let mut rotated = summaries.clone();
            let len = rotated.len();
            rotated.rotate_left(rotation % len);

            prop_assert_eq!(&forward, &aggregate_node_summaries(&reversed));
            prop_assert_eq!(&forward, &aggregate_node_summaries(&rotated));

            let (left, right) = summaries.split_at(len / 2);
            let merged = aggregate_node_summaries(left).merge(&aggregate_node_summaries(right));
            prop_assert_eq!(&forward, &merged);
        }
    }
}
