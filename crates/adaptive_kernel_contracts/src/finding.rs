#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::common::{validate_non_blank, validate_unit_interval};
use crate::guardrail::GuardrailId;
use crate::{ContractViolation, Validate};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EvidenceValue {
    Count(u64),
    Ratio(f64),
    Text(String),
    TextMap(BTreeMap<String, String>),
}

impl From<u64> for EvidenceValue {
    fn from(v: u64) -> Self {
        EvidenceValue::Count(v)
    }
}

impl From<f64> for EvidenceValue {
    fn from(v: f64) -> Self {
        EvidenceValue::Ratio(v)
    }
}

impl From<&str> for EvidenceValue {
    fn from(v: &str) -> Self {
        EvidenceValue::Text(v.to_string())
    }
}

impl From<BTreeMap<String, String>> for EvidenceValue {
    fn from(v: BTreeMap<String, String>) -> Self {
        EvidenceValue::TextMap(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub finding_id: String,
    pub title: String,
    pub severity: f64,
    pub evidence: BTreeMap<String, EvidenceValue>,
    pub guardrails: BTreeSet<GuardrailId>,
}

impl Finding {
    pub fn v1(
        finding_id: String,
        title: String,
        severity: f64,
        evidence: BTreeMap<String, EvidenceValue>,
        guardrails: BTreeSet<GuardrailId>,
    ) -> Result<Self, ContractViolation> {
        let finding = Self {
            finding_id,
            title,
            severity,
            evidence,
            guardrails,
        };
        finding.validate()?;
        Ok(finding)
    }
}

impl Validate for Finding {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_non_blank("finding.finding_id", &self.finding_id)?;
        validate_non_blank("finding.title", &self.title)?;
        validate_unit_interval("finding.severity", self.severity)?;
        if self.evidence.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "finding.evidence",
                reason: "must not be empty",
            });
        }
        for value in self.evidence.values() {
            if let EvidenceValue::Ratio(v) = value {
                if !v.is_finite() {
                    return Err(ContractViolation::NotFinite {
                        field: "finding.evidence",
                    });
                }
            }
        }
        if self.guardrails.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "finding.guardrails",
                reason: "must cite at least one guardrail",
            });
        }
        Ok(())
    }
}
