#![forbid(unsafe_code)]

use std::path::Path;

use adaptive_kernel_contracts::{AdaptiveRefuse, ReasonId};
use serde::Deserialize;

use crate::canonicalize::refuse;

pub const DEFAULT_WEIGHTS_JSON: &str = include_str!("../artifacts/confidence_weights_v3.json");
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Deserialize)]
struct WeightsDocument {
    version: String,
    weights: WeightsBody,
}

#[derive(Debug, Deserialize)]
struct WeightsBody {
    recurrence: f64,
    severity: f64,
    reproducibility: f64,
    cross_layer_impact: f64,
}

/// Versioned linear weights. Fields are private so a value that exists has
/// passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceWeights {
    version: String,
    recurrence: f64,
    severity: f64,
    reproducibility: f64,
    cross_layer_impact: f64,
}

impl ConfidenceWeights {
    pub fn v1(
        version: String,
        recurrence: f64,
        severity: f64,
        reproducibility: f64,
        cross_layer_impact: f64,
    ) -> Result<Self, AdaptiveRefuse> {
        if version.trim().is_empty() {
            return Err(invalid("version must not be blank"));
        }
        let weights = [
            ("recurrence", recurrence),
            ("severity", severity),
            ("reproducibility", reproducibility),
            ("cross_layer_impact", cross_layer_impact),
        ];
        for (name, w) in weights {
            if !w.is_finite() || !(0.0..=1.0).contains(&w) {
                return Err(invalid(format!("weight {name}={w} out of range")));
            }
        }
        let sum = recurrence + severity + reproducibility + cross_layer_impact;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(invalid(format!("weights must sum to 1.0, got {sum}")));
        }
        Ok(Self {
            version,
            recurrence,
            severity,
            reproducibility,
            cross_layer_impact,
        })
    }

    pub fn load_default() -> Result<Self, AdaptiveRefuse> {
        Self::load_from_str(DEFAULT_WEIGHTS_JSON)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, AdaptiveRefuse> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| invalid(format!("cannot read weights {}: {err}", path.display())))?;
        Self::load_from_str(&text)
    }

    pub fn load_from_str(text: &str) -> Result<Self, AdaptiveRefuse> {
        let doc: WeightsDocument = serde_json::from_str(text)
            .map_err(|err| invalid(format!("weights document rejected: {err}")))?;
        let weights = Self::v1(
            doc.version,
            doc.weights.recurrence,
            doc.weights.severity,
            doc.weights.reproducibility,
            doc.weights.cross_layer_impact,
        )?;
        tracing::debug!(version = weights.version.as_str(), "confidence weights loaded");
        Ok(weights)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn recurrence(&self) -> f64 {
        self.recurrence
    }

    pub fn severity(&self) -> f64 {
        self.severity
    }

    pub fn reproducibility(&self) -> f64 {
        self.reproducibility
    }

    pub fn cross_layer_impact(&self) -> f64 {
        self.cross_layer_impact
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInputs {
    pub recurrence_ratio: f64,
    pub avg_severity: f64,
    pub reproducibility: f64,
    pub cross_layer_impact: f64,
}

impl ConfidenceInputs {
    /// Each input clamped into [0,1]; NaN maps to 0.
    pub fn clamped(&self) -> Self {
        Self {
            recurrence_ratio: clamp_unit(self.recurrence_ratio),
            avg_severity: clamp_unit(self.avg_severity),
            reproducibility: clamp_unit(self.reproducibility),
            cross_layer_impact: clamp_unit(self.cross_layer_impact),
        }
    }
}

/// Linear, stateless score in [0,1] for any inputs, including out-of-range ones.
pub fn compute_confidence(inputs: &ConfidenceInputs, weights: &ConfidenceWeights) -> f64 {
    let x = inputs.clamped();
    clamp_unit(
        weights.recurrence * x.recurrence_ratio
            + weights.severity * x.avg_severity
            + weights.reproducibility * x.reproducibility
            + weights.cross_layer_impact * x.cross_layer_impact,
    )
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

fn invalid(message: impl Into<String>) -> AdaptiveRefuse {
    refuse(ReasonId::AcV3ConfWeightsInvalid, message)
}
