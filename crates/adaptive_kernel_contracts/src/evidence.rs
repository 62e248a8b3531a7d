#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{ContractViolation, Validate};

/// Ordered `key -> count` map. Counts are unsigned, so non-negativity holds by
/// construction; `decrement` refuses to go below zero instead of wrapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CountMap(BTreeMap<String, u64>);

impl CountMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> u64 {
        self.0.get(key).copied().unwrap_or(0)
    }

    /// Sets a count verbatim. Zero entries are kept; per-node summaries report
    /// them and aggregation skips them.
    pub fn insert(&mut self, key: impl Into<String>, count: u64) {
        self.0.insert(key.into(), count);
    }

    pub fn add(&mut self, key: &str, count: u64) {
        let current = self.0.entry(key.to_string()).or_insert(0);
        *current = current.saturating_add(count);
    }

    pub fn increment(&mut self, key: &str) {
        self.add(key, 1);
    }

    /// Removes one occurrence of `key`, dropping the entry when it reaches zero.
    /// Returns `false` when the key had nothing to remove.
    pub fn decrement(&mut self, key: &str) -> bool {
        let Some(current) = self.0.get_mut(key) else {
            return false;
        };
        if *current == 0 {
            return false;
        }
        *current -= 1;
        if *current == 0 {
            self.0.remove(key);
        }
        true
    }

    pub fn total(&self) -> u64 {
        self.0.values().fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    pub fn max_count(&self) -> Option<u64> {
        self.0.values().copied().max()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for CountMap {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        let mut map = CountMap::new();
        for (key, count) in iter {
            let key = key.into();
            map.add(&key, count);
        }
        map
    }
}

/// Point-in-time aggregate of an evidence store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceSnapshot {
    pub total_events: u64,
    pub by_source_layer: CountMap,
    pub by_event_type: CountMap,
    pub by_upstream_reason_id: CountMap,
}

impl EvidenceSnapshot {
    pub fn v1(
        total_events: u64,
        by_source_layer: CountMap,
        by_event_type: CountMap,
        by_upstream_reason_id: CountMap,
    ) -> Result<Self, ContractViolation> {
        let snapshot = Self {
            total_events,
            by_source_layer,
            by_event_type,
            by_upstream_reason_id,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn empty() -> Self {
        Self {
            total_events: 0,
            by_source_layer: CountMap::new(),
            by_event_type: CountMap::new(),
            by_upstream_reason_id: CountMap::new(),
        }
    }
}

impl Validate for EvidenceSnapshot {
    fn validate(&self) -> Result<(), ContractViolation> {
        // Every event contributes exactly one key to each counter.
        let counters = [
            ("evidence_snapshot.by_source_layer", &self.by_source_layer),
            ("evidence_snapshot.by_event_type", &self.by_event_type),
            (
                "evidence_snapshot.by_upstream_reason_id",
                &self.by_upstream_reason_id,
            ),
        ];
        for (field, counter) in counters {
            if counter.total() != self.total_events {
                return Err(ContractViolation::InvalidValue {
                    field,
                    reason: "counts must sum to total_events",
                });
            }
            if counter.keys().any(str::is_empty) {
                return Err(ContractViolation::InvalidValue {
                    field,
                    reason: "keys must be non-empty",
                });
            }
        }
        Ok(())
    }
}
