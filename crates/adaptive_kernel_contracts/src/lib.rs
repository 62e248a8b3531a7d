#![forbid(unsafe_code)]

pub mod canonical;
pub mod canonical_json;
pub mod common;
pub mod correlation;
pub mod evidence;
pub mod finding;
pub mod guardrail;
pub mod report;

pub use common::{AdaptiveRefuse, ContractViolation, ReasonId, Validate};
