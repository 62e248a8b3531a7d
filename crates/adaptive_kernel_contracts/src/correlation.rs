#![forbid(unsafe_code)]

use serde::Serialize;

use crate::common::validate_utc_timestamp;
use crate::evidence::CountMap;
use crate::{ContractViolation, Validate};

/// Per-node rollup shipped to the correlator instead of raw events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummaryEvent {
    pub node_id: String,
    pub window_start: String,
    pub window_end: String,
    pub total_events: u64,
    pub by_upstream_reason_id: CountMap,
}

impl NodeSummaryEvent {
    pub fn v1(
        node_id: String,
        window_start: String,
        window_end: String,
        total_events: u64,
        by_upstream_reason_id: CountMap,
    ) -> Result<Self, ContractViolation> {
        let summary = Self {
            node_id,
            window_start,
            window_end,
            total_events,
            by_upstream_reason_id,
        };
        summary.validate()?;
        Ok(summary)
    }
}

impl Validate for NodeSummaryEvent {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.node_id.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "node_summary_event.node_id",
                reason: "must be non-empty",
            });
        }
        validate_utc_timestamp("node_summary_event.window_start", &self.window_start)?;
        validate_utc_timestamp("node_summary_event.window_end", &self.window_end)?;
        if self.by_upstream_reason_id.keys().any(str::is_empty) {
            return Err(ContractViolation::InvalidValue {
                field: "node_summary_event.by_upstream_reason_id",
                reason: "keys must be non-empty",
            });
        }
        Ok(())
    }
}

/// Cross-node aggregate. `nodes_reporting_reason_id` counts distinct nodes with a
/// non-zero count for the reason, not occurrences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorrelationSnapshot {
    pub total_nodes: u64,
    pub total_events: u64,
    pub by_upstream_reason_id: CountMap,
    pub nodes_reporting_reason_id: CountMap,
}

impl CorrelationSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Folds one node summary in. Order of calls never changes the result.
    pub fn absorb(&mut self, summary: &NodeSummaryEvent) {
        self.total_nodes = self.total_nodes.saturating_add(1);
        self.total_events = self.total_events.saturating_add(summary.total_events);
        for (reason_id, count) in summary.by_upstream_reason_id.iter() {
            if count == 0 {
                continue;
            }
            self.by_upstream_reason_id.add(reason_id, count);
            self.nodes_reporting_reason_id.increment(reason_id);
        }
    }

    /// Combines two partial aggregates built over disjoint sets of nodes.
    pub fn merge(mut self, other: &CorrelationSnapshot) -> CorrelationSnapshot {
        self.total_nodes = self.total_nodes.saturating_add(other.total_nodes);
        self.total_events = self.total_events.saturating_add(other.total_events);
        for (reason_id, count) in other.by_upstream_reason_id.iter() {
            self.by_upstream_reason_id.add(reason_id, count);
        }
        for (reason_id, nodes) in other.nodes_reporting_reason_id.iter() {
            self.nodes_reporting_reason_id.add(reason_id, nodes);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(node_id: &str, counts: &[(&str, u64)]) -> NodeSummaryEvent {
        let total = counts.iter().map(|(_, c)| *c).sum();
        NodeSummaryEvent::v1(
            node_id.to_string(),
            "2026-01-14T00:00:00Z".to_string(),
            "2026-01-14T01:00:00Z".to_string(),
            total,
            counts.iter().map(|(k, v)| (*k, *v)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn at_corr_contract_01_absorb_counts_nodes_not_occurrences() {
        let mut snap = CorrelationSnapshot::empty();
        snap.absorb(&summary("n1", &[("X", 5), ("Y", 0)]));
        snap.absorb(&summary("n2", &[("X", 2)]));
        assert_eq!(snap.total_nodes, 2);
        assert_eq!(snap.total_events, 7);
        assert_eq!(snap.by_upstream_reason_id.get("X"), 7);
        assert_eq!(snap.nodes_reporting_reason_id.get("X"), 2);
        assert_eq!(snap.nodes_reporting_reason_id.get("Y"), 0);
        assert!(snap.by_upstream_reason_id.keys().all(|k| k != "Y"));
    }

    #[test]
    fn at_corr_contract_02_merge_matches_sequential_absorb() {
        let a = summary("n1", &[("X", 1)]);
        let b = summary("n2", &[("X", 3), ("Z", 1)]);

        let mut sequential = CorrelationSnapshot::empty();
        sequential.absorb(&a);
        sequential.absorb(&b);

        let mut left = CorrelationSnapshot::empty();
        left.absorb(&a);
        let mut right = CorrelationSnapshot::empty();
        right.absorb(&b);

        assert_eq!(left.merge(&right), sequential);
    }

    #[test]
    fn at_corr_contract_03_summary_rejects_empty_node_and_naive_window() {
        assert!(NodeSummaryEvent::v1(
            String::new(),
            "2026-01-14T00:00:00Z".to_string(),
            "2026-01-14T01:00:00Z".to_string(),
            0,
            CountMap::new(),
        )
        .is_err());
        assert!(NodeSummaryEvent::v1(
            "n1".to_string(),
            "2026-01-14T00:00:00".to_string(),
            "2026-01-14T01:00:00Z".to_string(),
            0,
            CountMap::new(),
        )
        .is_err());
    }
}
