#![forbid(unsafe_code)]

pub mod event_sink;
pub mod evidence_store;
pub mod shared;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("evidence store capacity must be > 0, got {max_events}")]
    InvalidCapacity { max_events: usize },
    #[error("evidence counters out of sync while evicting {content_hash}")]
    CounterUnderflow { content_hash: String },
    #[error("evidence store lock poisoned")]
    LockPoisoned,
}
