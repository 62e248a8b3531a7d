#![forbid(unsafe_code)]

use std::num::NonZeroUsize;
use std::thread;

use adaptive_engines::correlation::aggregate_node_summaries;
use adaptive_engines::node_summary::summarize_snapshot;
use adaptive_kernel_contracts::correlation::{CorrelationSnapshot, NodeSummaryEvent};
use adaptive_storage::shared::SharedEvidenceStore;

use crate::OsError;

#[derive(Debug, Clone)]
pub struct NodeStore<'a> {
    pub node_id: &'a str,
    pub store: &'a SharedEvidenceStore,
}

/// One summary per node over the same reporting window, in input order.
pub fn collect_node_summaries(
    window_start: &str,
    window_end: &str,
    nodes: &[NodeStore<'_>],
) -> Result<Vec<NodeSummaryEvent>, OsError> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let snapshot = node.store.snapshot()?;
        out.push(summarize_snapshot(
            node.node_id,
            window_start,
            window_end,
            &snapshot,
        )?);
    }
    Ok(out)
}

/// Aggregates summaries on up to `partitions` scoped threads and merges the
/// partial snapshots. The result equals a single sequential aggregation.
pub fn aggregate_partitioned(
    summaries: &[NodeSummaryEvent],
    partitions: NonZeroUsize,
) -> CorrelationSnapshot {
    if summaries.is_empty() {
        return CorrelationSnapshot::empty();
    }
    let chunk = summaries.len().div_ceil(partitions.get());
    let partials = thread::scope(|scope| {
        let handles = summaries
            .chunks(chunk)
            .map(|part| scope.spawn(move || aggregate_node_summaries(part)))
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(partial) => partial,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect::<Vec<_>>()
    });
    let merged = partials
        .iter()
        .fold(CorrelationSnapshot::empty(), |acc, part| acc.merge(part));
    tracing::debug!(
        partitions = partials.len(),
        total_nodes = merged.total_nodes,
        "node summaries aggregated"
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptive_kernel_contracts::evidence::CountMap;

    fn summary(i: usize) -> NodeSummaryEvent {
        let mut counts = CountMap::new();
        counts.insert("X", (i % 3) as u64);
        counts.insert(format!("R{}", i % 4), 2);
        NodeSummaryEvent::v1(
            format!("node-{i}"),
            "2026-01-14T00:00:00Z".to_string(),
            "2026-01-14T01:00:00Z".to_string(),
            counts.total(),
            counts,
        )
        .unwrap()
    }

    #[test]
    fn at_fleet_01_partitioned_equals_sequential() {
        let summaries = (0..17).map(summary).collect::<Vec<_>>();
        let sequential = aggregate_node_summaries(&summaries);
        for parts in [1usize, 2, 3, 8, 32] {
            let parts = NonZeroUsize::new(parts).unwrap();
            assert_eq!(aggregate_partitioned(&summaries, parts), sequential);
        }
        let one = NonZeroUsize::new(1).unwrap();
        assert_eq!(aggregate_partitioned(&[], one), CorrelationSnapshot::empty());
    }
}
