#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use adaptive_kernel_contracts::canonical::CanonicalEvent;
use adaptive_kernel_contracts::evidence::EvidenceSnapshot;

use crate::evidence_store::EvidenceStore;
use crate::StorageError;

/// Evidence store shared between producer threads.
///
/// `add` (append, counter update, eviction) and `snapshot` both run under one
/// lock, so a snapshot never observes counters that disagree with the event
/// count.
#[derive(Debug, Clone)]
pub struct SharedEvidenceStore {
    inner: Arc<Mutex<EvidenceStore>>,
}

impl SharedEvidenceStore {
    pub fn new(max_events: usize) -> Result<Self, StorageError> {
        Ok(Self::from_store(EvidenceStore::new(max_events)?))
    }

    pub fn from_store(store: EvidenceStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn add(&self, event: CanonicalEvent) -> Result<Option<CanonicalEvent>, StorageError> {
        self.lock()?.add(event)
    }

    pub fn snapshot(&self) -> Result<EvidenceSnapshot, StorageError> {
        Ok(self.lock()?.snapshot())
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, EvidenceStore>, StorageError> {
        match self.inner.lock() {
            Ok(guard) => Ok(guard),
            // A panicking writer may have stopped between eviction and
            // increment. The poison flag stays set, so every later access
            // refuses as well.
            Err(_) => {
                tracing::warn!("evidence store lock poisoned; refusing access");
                Err(StorageError::LockPoisoned)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::thread;

    use super::*;

    fn event(reason_id: &str, correlation_id: String) -> CanonicalEvent {
        CanonicalEvent::v1(
            "sentinel".to_string(),
            "anomaly".to_string(),
            0.2,
            "2026-01-14T00:00:00Z".to_string(),
            correlation_id,
            BTreeMap::new(),
            reason_id.to_string(),
        )
        .unwrap()
    }

    #[test]
    fn at_shared_01_concurrent_writers_keep_counters_consistent() {
        let store = SharedEvidenceStore::new(64).unwrap();
        thread::scope(|scope| {
            for worker in 0..4 {
                let store = store.clone();
                scope.spawn(move || {
                    for i in 0..100 {
                        let reason = if i % 2 == 0 { "EVEN" } else { "ODD" };
                        store.add(event(reason, format!("w{worker}-{i}"))).unwrap();
                        let snap = store.snapshot().unwrap();
                        assert_eq!(snap.by_upstream_reason_id.total(), snap.total_events);
                    }
                });
            }
        });
        let snap = store.snapshot().unwrap();
        assert_eq!(snap.total_events, 64);
        assert_eq!(snap.by_source_layer.get("sentinel"), 64);
        assert_eq!(store.len().unwrap(), 64);
    }

    #[test]
    fn at_shared_02_poisoned_store_refuses_every_later_call() {
        let store = SharedEvidenceStore::new(4).unwrap();
        let writer = store.clone();
        let _ = thread::spawn(move || {
            let _guard = writer.inner.lock().unwrap();
            panic!("writer died mid-update");
        })
        .join();
        assert_eq!(store.snapshot().unwrap_err(), StorageError::LockPoisoned);
        assert_eq!(store.len().unwrap_err(), StorageError::LockPoisoned);
        assert_eq!(
            store.add(event("LATE", "late".to_string())).unwrap_err(),
            StorageError::LockPoisoned
        );
    }
}
