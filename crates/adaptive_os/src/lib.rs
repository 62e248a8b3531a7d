#![forbid(unsafe_code)]

pub mod context;
pub mod fleet;
pub mod ingest;
pub mod pipeline;

use adaptive_kernel_contracts::AdaptiveRefuse;
use adaptive_storage::StorageError;

/// Anything the wiring layer can fail with. Refusals keep their stable reason
/// id; storage faults are not reason-coded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OsError {
    #[error(transparent)]
    Refused(#[from] AdaptiveRefuse),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}
