#![forbid(unsafe_code)]

pub mod analyze;
pub mod canonicalize;
pub mod confidence;
pub mod correlation;
pub mod drift;
pub mod envelope;
pub mod guardrails;
pub mod node_summary;
pub mod render;
pub mod report;
