#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use adaptive_kernel_contracts::canonical::CanonicalEvent;
use adaptive_kernel_contracts::evidence::{CountMap, EvidenceSnapshot};

use crate::StorageError;

/// Bounded FIFO of canonical events with running per-key counters.
///
/// Invariant after every public call: `len() <= capacity()` and each counter
/// sums to `len()`.
#[derive(Debug, Clone)]
pub struct EvidenceStore {
    max_events: NonZeroUsize,
    events: VecDeque<CanonicalEvent>,
    by_source_layer: CountMap,
    by_event_type: CountMap,
    by_upstream_reason_id: CountMap,
}

impl EvidenceStore {
    pub fn new(max_events: usize) -> Result<Self, StorageError> {
        let max_events =
            NonZeroUsize::new(max_events).ok_or(StorageError::InvalidCapacity { max_events })?;
        Ok(Self {
            max_events,
            events: VecDeque::with_capacity(max_events.get()),
            by_source_layer: CountMap::new(),
            by_event_type: CountMap::new(),
            by_upstream_reason_id: CountMap::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.max_events.get()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Appends `event`; when the store is full the oldest event is evicted first
    /// and returned. Eviction depends only on insertion order.
    pub fn add(&mut self, event: CanonicalEvent) -> Result<Option<CanonicalEvent>, StorageError> {
        let evicted = if self.events.len() == self.max_events.get() {
            if let Some(oldest) = self.events.front() {
                self.check_counted(oldest)?;
            }
            let oldest = self.events.pop_front();
            if let Some(oldest) = &oldest {
                self.forget(oldest);
            }
            oldest
        } else {
            None
        };

        self.by_source_layer.increment(event.source_layer());
        self.by_event_type.increment(event.event_type());
        self.by_upstream_reason_id.increment(event.reason_id());
        self.events.push_back(event);

        if let Some(oldest) = &evicted {
            tracing::debug!(
                content_hash = oldest.content_hash(),
                reason_id = oldest.reason_id(),
                "evidence store evicted oldest event"
            );
        }
        Ok(evicted)
    }

    /// Deep copy of the counters; later `add` calls never reach it.
    pub fn snapshot(&self) -> EvidenceSnapshot {
        EvidenceSnapshot {
            total_events: self.events.len() as u64,
            by_source_layer: self.by_source_layer.clone(),
            by_event_type: self.by_event_type.clone(),
            by_upstream_reason_id: self.by_upstream_reason_id.clone(),
        }
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &CanonicalEvent> {
        self.events.iter()
    }

    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &CanonicalEvent> {
        self.events.iter().skip(self.events.len().saturating_sub(limit))
    }

    pub fn events_by_content_hash<'a>(
        &'a self,
        content_hash: &'a str,
    ) -> impl Iterator<Item = &'a CanonicalEvent> + 'a {
        self.events
            .iter()
            .filter(move |e| e.content_hash() == content_hash)
    }

    /// Refuses before any mutation when `event` is not fully counted.
    fn check_counted(&self, event: &CanonicalEvent) -> Result<(), StorageError> {
        let counted = self.by_source_layer.get(event.source_layer()) > 0
            && self.by_event_type.get(event.event_type()) > 0
            && self.by_upstream_reason_id.get(event.reason_id()) > 0;
        if !counted {
            return Err(StorageError::CounterUnderflow {
                content_hash: event.content_hash().to_string(),
            });
        }
        Ok(())
    }

    fn forget(&mut self, event: &CanonicalEvent) {
        self.by_source_layer.decrement(event.source_layer());
        self.by_event_type.decrement(event.event_type());
        self.by_upstream_reason_id.decrement(event.reason_id());
    }
}
