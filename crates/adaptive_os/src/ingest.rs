#![forbid(unsafe_code)]

use adaptive_engines::canonicalize::canonicalize_event;
use adaptive_kernel_contracts::canonical::CanonicalEvent;
use adaptive_kernel_contracts::AdaptiveRefuse;
use adaptive_storage::event_sink::EventSink;
use adaptive_storage::shared::SharedEvidenceStore;
use serde_json::Value;

use crate::OsError;

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Accepted {
        content_hash: String,
        evicted_content_hash: Option<String>,
    },
    Rejected(AdaptiveRefuse),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestSummary {
    pub accepted: u64,
    pub evicted: u64,
    /// Position in the batch and the refusal for each rejected observation.
    pub rejected: Vec<(usize, AdaptiveRefuse)>,
}

/// Canonicalizes one raw observation, stores it and hands it to the sink.
///
/// A malformed observation is an outcome, not an error; only storage faults
/// abort.
pub fn ingest_observation(
    store: &SharedEvidenceStore,
    sink: &mut dyn EventSink,
    raw: &Value,
) -> Result<IngestOutcome, OsError> {
    let event = match canonicalize_event(raw) {
        Ok(event) => event,
        Err(refuse) => return Ok(IngestOutcome::Rejected(refuse)),
    };
    store_event(store, sink, event)
}

fn store_event(
    store: &SharedEvidenceStore,
    sink: &mut dyn EventSink,
    event: CanonicalEvent,
) -> Result<IngestOutcome, OsError> {
    let evicted = store.add(event.clone())?;
    sink.store_event(&event);
    let content_hash = event.content_hash().to_string();
    Ok(IngestOutcome::Accepted {
        content_hash,
        evicted_content_hash: evicted.map(|e| e.content_hash().to_string()),
    })
}

pub fn ingest_batch<'a, I>(
    store: &SharedEvidenceStore,
    sink: &mut dyn EventSink,
    raws: I,
) -> Result<IngestSummary, OsError>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut summary = IngestSummary::default();
    for (idx, raw) in raws.into_iter().enumerate() {
        match ingest_observation(store, sink, raw)? {
            IngestOutcome::Accepted {
                evicted_content_hash,
                ..
            } => {
                summary.accepted += 1;
                if evicted_content_hash.is_some() {
                    summary.evicted += 1;
                }
            }
            IngestOutcome::Rejected(refuse) => summary.rejected.push((idx, refuse)),
        }
    }
    tracing::debug!(
        accepted = summary.accepted,
        evicted = summary.evicted,
        rejected = summary.rejected.len(),
        "observation batch ingested"
    );
    Ok(summary)
}
