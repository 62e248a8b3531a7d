#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

use adaptive_engines::confidence::ConfidenceWeights;
use adaptive_engines::correlation::CorrelationConfig;
use adaptive_engines::envelope::{NoopSigner, ReportSigner};
use adaptive_engines::guardrails::GuardrailRegistry;
use adaptive_engines::report::ReportBuilderConfig;
use adaptive_kernel_contracts::AdaptiveRefuse;

pub const DEFAULT_STORE_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveWiringConfig {
    pub store_capacity: usize,
    pub report: ReportBuilderConfig,
    pub correlation: CorrelationConfig,
}

impl AdaptiveWiringConfig {
    pub fn mvp_v1() -> Self {
        Self {
            store_capacity: DEFAULT_STORE_CAPACITY,
            report: ReportBuilderConfig::mvp_v1(),
            correlation: CorrelationConfig::mvp_v1(),
        }
    }
}

impl Default for AdaptiveWiringConfig {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

/// Registry, weights and signer loaded once and shared read-only by every
/// pipeline run. Cloning is cheap.
#[derive(Clone)]
pub struct AdaptiveContext {
    registry: Arc<GuardrailRegistry>,
    weights: Arc<ConfidenceWeights>,
    signer: Arc<dyn ReportSigner + Send + Sync>,
    config: AdaptiveWiringConfig,
}

impl AdaptiveContext {
    pub fn new(registry: GuardrailRegistry, weights: ConfidenceWeights) -> Self {
        Self {
            registry: Arc::new(registry),
            weights: Arc::new(weights),
            signer: Arc::new(NoopSigner),
            config: AdaptiveWiringConfig::mvp_v1(),
        }
    }

    /// Bundled registry and weights; fails closed if either artifact is bad.
    pub fn load_default() -> Result<Self, AdaptiveRefuse> {
        Ok(Self::new(
            GuardrailRegistry::load_default()?,
            ConfidenceWeights::load_default()?,
        ))
    }

    pub fn from_documents(registry_json: &str, weights_json: &str) -> Result<Self, AdaptiveRefuse> {
        Ok(Self::new(
            GuardrailRegistry::load_from_str(registry_json)?,
            ConfidenceWeights::load_from_str(weights_json)?,
        ))
    }

    pub fn with_signer(mut self, signer: Arc<dyn ReportSigner + Send + Sync>) -> Self {
        self.signer = signer;
        self
    }

    pub fn with_config(mut self, config: AdaptiveWiringConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &GuardrailRegistry {
        &self.registry
    }

    pub fn weights(&self) -> &ConfidenceWeights {
        &self.weights
    }

    pub fn signer(&self) -> &(dyn ReportSigner + Send + Sync) {
        self.signer.as_ref()
    }

    pub fn config(&self) -> &AdaptiveWiringConfig {
        &self.config
    }
}

impl fmt::Debug for AdaptiveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveContext")
            .field("registry_version", &self.registry.version())
            .field("weights_version", &self.weights.version())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
