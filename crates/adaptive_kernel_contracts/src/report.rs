#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::common::{validate_non_blank, validate_unit_interval};
use crate::evidence::EvidenceSnapshot;
use crate::finding::Finding;
use crate::guardrail::GuardrailId;
use crate::{ContractViolation, Validate};

pub const SIGNATURE_ABSENT: &str = "ABSENT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType {
    SignalCollectionNotice,
    UpgradeReport,
}

impl ReportType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::SignalCollectionNotice => "SIGNAL_COLLECTION_NOTICE",
            ReportType::UpgradeReport => "UPGRADE_REPORT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvelopeCapability {
    Absent,
    Present,
}

impl EnvelopeCapability {
    pub fn as_str(self) -> &'static str {
        match self {
            EnvelopeCapability::Absent => "ABSENT",
            EnvelopeCapability::Present => "PRESENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Toggle {
    Off,
    On,
}

impl Toggle {
    pub fn as_str(self) -> &'static str {
        match self {
            Toggle::Off => "OFF",
            Toggle::On => "ON",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Capabilities {
    pub envelope: EnvelopeCapability,
    pub correlation: Toggle,
    pub archival: Toggle,
    pub telemetry: Toggle,
}

impl Capabilities {
    /// Everything off, envelope unsigned.
    pub fn minimal() -> Self {
        Self {
            envelope: EnvelopeCapability::Absent,
            correlation: Toggle::Off,
            archival: Toggle::Off,
            telemetry: Toggle::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceBreakdown {
    pub recurrence_ratio: f64,
    pub avg_severity: f64,
    pub reproducibility: f64,
    pub cross_layer_impact: f64,
}

impl Validate for ConfidenceBreakdown {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_unit_interval(
            "confidence_breakdown.recurrence_ratio",
            self.recurrence_ratio,
        )?;
        validate_unit_interval("confidence_breakdown.avg_severity", self.avg_severity)?;
        validate_unit_interval("confidence_breakdown.reproducibility", self.reproducibility)?;
        validate_unit_interval(
            "confidence_breakdown.cross_layer_impact",
            self.cross_layer_impact,
        )?;
        Ok(())
    }
}

/// The advisory artifact. It describes what should be hardened; nothing in it
/// is ever applied automatically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpgradeReport {
    pub report_id: String,
    pub report_type: ReportType,
    pub target_layers: Vec<String>,
    pub evidence: EvidenceSnapshot,
    pub findings: Vec<Finding>,
    pub guardrails: Vec<GuardrailId>,
    pub guardrail_titles: BTreeMap<GuardrailId, String>,
    pub confidence: f64,
    pub confidence_breakdown: ConfidenceBreakdown,
    pub capabilities: Capabilities,
    pub recommended_actions: Vec<String>,
    pub required_tests: Vec<String>,
    pub exit_criteria: Vec<String>,
    pub forbidden_actions: Vec<String>,
}

impl Validate for UpgradeReport {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_non_blank("upgrade_report.report_id", &self.report_id)?;
        if self.target_layers.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "upgrade_report.target_layers",
                reason: "must not be empty",
            });
        }
        for layer in &self.target_layers {
            validate_non_blank("upgrade_report.target_layers", layer)?;
        }
        if self.target_layers.windows(2).any(|w| w[0] > w[1]) {
            return Err(ContractViolation::InvalidValue {
                field: "upgrade_report.target_layers",
                reason: "must be sorted",
            });
        }
        self.evidence.validate()?;
        let mut cited = BTreeSet::new();
        for finding in &self.findings {
            finding.validate()?;
            cited.extend(finding.guardrails.iter().copied());
        }
        if self.guardrails.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ContractViolation::InvalidValue {
                field: "upgrade_report.guardrails",
                reason: "must be sorted and unique",
            });
        }
        if self.guardrails.iter().copied().collect::<BTreeSet<_>>() != cited {
            return Err(ContractViolation::InvalidValue {
                field: "upgrade_report.guardrails",
                reason: "must equal the union of finding guardrails",
            });
        }
        if self.guardrail_titles.keys().copied().collect::<Vec<_>>() != self.guardrails {
            return Err(ContractViolation::InvalidValue {
                field: "upgrade_report.guardrail_titles",
                reason: "must title exactly the cited guardrails",
            });
        }
        validate_unit_interval("upgrade_report.confidence", self.confidence)?;
        self.confidence_breakdown.validate()?;
        if self.recommended_actions.is_empty() || self.exit_criteria.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "upgrade_report.recommended_actions",
                reason: "actions and exit criteria must not be empty",
            });
        }
        match self.report_type {
            ReportType::SignalCollectionNotice if !self.required_tests.is_empty() => {
                Err(ContractViolation::InvalidValue {
                    field: "upgrade_report.required_tests",
                    reason: "must be empty for a collection notice",
                })
            }
            ReportType::UpgradeReport if self.required_tests.is_empty() => {
                Err(ContractViolation::InvalidValue {
                    field: "upgrade_report.required_tests",
                    reason: "must not be empty for an upgrade report",
                })
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEnvelope {
    pub report_hash: String,
    pub classical_signature: String,
    pub pqc_signature: String,
}

impl ReportEnvelope {
    pub fn v1(
        report_hash: String,
        classical_signature: String,
        pqc_signature: String,
    ) -> Result<Self, ContractViolation> {
        let envelope = Self {
            report_hash,
            classical_signature,
            pqc_signature,
        };
        envelope.validate()?;
        Ok(envelope)
    }

    pub fn is_signed(&self) -> bool {
        self.classical_signature != SIGNATURE_ABSENT || self.pqc_signature != SIGNATURE_ABSENT
    }
}

impl Validate for ReportEnvelope {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.report_hash.len() != 64
            || !self
                .report_hash
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(ContractViolation::InvalidValue {
                field: "report_envelope.report_hash",
                reason: "must be 64 lowercase hex chars",
            });
        }
        validate_non_blank(
            "report_envelope.classical_signature",
            &self.classical_signature,
        )?;
        validate_non_blank("report_envelope.pqc_signature", &self.pqc_signature)?;
        Ok(())
    }
}
