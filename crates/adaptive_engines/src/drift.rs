#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use adaptive_kernel_contracts::common::validate_non_blank;
use adaptive_kernel_contracts::finding::{EvidenceValue, Finding};
use adaptive_kernel_contracts::guardrail::{amg, GuardrailId};
use adaptive_kernel_contracts::{AdaptiveRefuse, ContractViolation, ReasonId, Validate};
use serde::{Deserialize, Serialize};

use crate::canonicalize::refuse;

pub const DRIFT_FINDING_PREFIX: &str = "AC-DRIFT::";

/// Fail-closed defaults, explicit cross-layer assumptions, drift reported and
/// never auto-resolved.
pub const DRIFT_GUARDRAILS: [GuardrailId; 3] = [amg(11), amg(24), amg(66)];

/// Assumptions one layer declares about the shared contract surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerContract {
    pub layer: String,
    pub assumptions: BTreeMap<String, String>,
}

impl LayerContract {
    pub fn v1(
        layer: impl Into<String>,
        assumptions: BTreeMap<String, String>,
    ) -> Result<Self, ContractViolation> {
        let contract = Self {
            layer: layer.into(),
            assumptions,
        };
        contract.validate()?;
        Ok(contract)
    }
}

impl Validate for LayerContract {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_non_blank("layer_contract.layer", &self.layer)?;
        for key in self.assumptions.keys() {
            validate_non_blank("layer_contract.assumptions", key)?;
        }
        Ok(())
    }
}

/// key -> layer -> declared value, all sorted.
type AssumptionIndex<'a> = BTreeMap<&'a str, BTreeMap<&'a str, &'a str>>;

fn index_contracts(contracts: &[LayerContract]) -> Result<AssumptionIndex<'_>, AdaptiveRefuse> {
    let mut layers = BTreeSet::new();
    let mut index: AssumptionIndex<'_> = BTreeMap::new();
    for contract in contracts {
        contract
            .validate()
            .map_err(|violation| AdaptiveRefuse::from_violation(ReasonId::AcV3ReportInvalid, &violation))?;
        if !layers.insert(contract.layer.as_str()) {
            return Err(refuse(
                ReasonId::AcV3ReportInvalid,
                format!("layer {} declares its contract twice", contract.layer),
            ));
        }
        for (key, value) in &contract.assumptions {
            index
                .entry(key.as_str())
                .or_default()
                .insert(contract.layer.as_str(), value.as_str());
        }
    }
    Ok(index)
}

fn distinct_values(by_layer: &BTreeMap<&str, &str>) -> usize {
    by_layer.values().collect::<BTreeSet<_>>().len()
}

/// One finding per assumption key on which at least two layers disagree.
///
/// A key declared by a single layer is not drift. Drift is only reported;
/// nothing here picks a winning value.
pub fn generate_drift_findings(contracts: &[LayerContract]) -> Result<Vec<Finding>, AdaptiveRefuse> {
    let index = index_contracts(contracts)?;
    let mut findings = Vec::new();

    for (key, by_layer) in &index {
        let distinct = distinct_values(by_layer);
        if distinct < 2 {
            continue;
        }

        let values = by_layer
            .iter()
            .map(|(layer, value)| (layer.to_string(), value.to_string()))
            .collect::<BTreeMap<_, _>>();
        let mut evidence = BTreeMap::new();
        evidence.insert("assumption".to_string(), EvidenceValue::from(*key));
        evidence.insert("values_by_layer".to_string(), EvidenceValue::from(values));
        evidence.insert(
            "distinct_values".to_string(),
            EvidenceValue::from(distinct as u64),
        );

        let severity = (0.4 + 0.1 * (distinct - 1) as f64).min(1.0);
        let finding = Finding::v1(
            format!("{DRIFT_FINDING_PREFIX}{key}"),
            format!("Layer contract drift on assumption: {key}"),
            severity,
            evidence,
            DRIFT_GUARDRAILS.into_iter().collect::<BTreeSet<_>>(),
        )
        .map_err(|violation| AdaptiveRefuse::from_violation(ReasonId::AcV3ReportInvalid, &violation))?;
        findings.push(finding);
    }

    tracing::debug!(
        contracts = contracts.len(),
        findings = findings.len(),
        "drift analysis complete"
    );
    Ok(findings)
}

/// Graphviz view of the drift findings in `findings`: one node per layer named
/// in a finding's `values_by_layer`, one edge per pair of those layers that
/// disagree on the finding's assumption. Other findings are ignored.
pub fn render_drift_dot(findings: &[Finding]) -> Result<String, AdaptiveRefuse> {
    let mut layers = BTreeSet::new();
    let mut edges = BTreeSet::new();
    for finding in findings {
        let Some(key) = finding.finding_id.strip_prefix(DRIFT_FINDING_PREFIX) else {
            continue;
        };
        let Some(EvidenceValue::TextMap(by_layer)) = finding.evidence.get("values_by_layer") else {
            return Err(refuse(
                ReasonId::AcV3ReportInvalid,
                format!("drift finding {} has no values_by_layer", finding.finding_id),
            ));
        };
        layers.extend(by_layer.keys().map(String::as_str));
        let declared = by_layer.iter().collect::<Vec<_>>();
        for (i, (left, left_value)) in declared.iter().enumerate() {
            for (right, right_value) in &declared[i + 1..] {
                if left_value != right_value {
                    edges.insert((left.as_str(), right.as_str(), key));
                }
            }
        }
    }

    let mut out = String::new();
    write_drift_dot(&layers, &edges, &mut out).map_err(|_| {
        refuse(ReasonId::AcV3ReportInvalid, "drift graph rendering failed")
    })?;
    Ok(out)
}

fn write_drift_dot(
    layers: &BTreeSet<&str>,
    edges: &BTreeSet<(&str, &str, &str)>,
    out: &mut String,
) -> std::fmt::Result {
    writeln!(out, "digraph DriftRadar {{")?;
    writeln!(out, "  rankdir=LR;")?;
    for layer in layers {
        writeln!(out, "  \"{}\";", dot_escape(layer))?;
    }
    for (left, right, key) in edges {
        writeln!(
            out,
            "  \"{}\" -> \"{}\" [label=\"{}\"];",
            dot_escape(left),
            dot_escape(right),
            dot_escape(key)
        )?;
    }
    writeln!(out, "}}")
}

fn dot_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(layer: &str, pairs: &[(&str, &str)]) -> LayerContract {
        LayerContract::v1(
            layer,
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn at_drift_01_disagreeing_layers_emit_one_finding_per_key() {
        let contracts = vec![
            contract("Sentinel", &[("meta.canonical", "true"), ("ts.zone", "UTC")]),
            contract("DQSN", &[("meta.canonical", "false"), ("ts.zone", "UTC")]),
        ];
        let findings = generate_drift_findings(&contracts).unwrap();
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.finding_id, "AC-DRIFT::meta.canonical");
        assert!((finding.severity - 0.5).abs() < 1e-12);
        assert_eq!(
            finding.guardrails.iter().map(|g| g.to_string()).collect::<Vec<_>>(),
            vec!["AMG-011", "AMG-024", "AMG-066"]
        );
        let Some(EvidenceValue::TextMap(values)) = finding.evidence.get("values_by_layer") else {
            panic!("values_by_layer missing");
        };
        assert_eq!(values["DQSN"], "false");
        assert_eq!(values["Sentinel"], "true");
    }

    #[test]
    fn at_drift_02_severity_grows_with_distinct_values_and_caps() {
        let contracts = (0..12)
            .map(|i| contract(&format!("L{i:02}"), &[("mode", format!("v{i}").as_str())]))
            .collect::<Vec<_>>();
        let findings = generate_drift_findings(&contracts).unwrap();
        assert_eq!(findings[0].severity, 1.0);

        let three = contracts[..3].to_vec();
        let findings = generate_drift_findings(&three).unwrap();
        assert!((findings[0].severity - 0.6).abs() < 1e-12);
    }

    #[test]
    fn at_drift_03_single_declarations_and_agreement_are_not_drift() {
        let contracts = vec![
            contract("A", &[("only.a", "1"), ("shared", "x")]),
            contract("B", &[("shared", "x")]),
        ];
        assert!(generate_drift_findings(&contracts).unwrap().is_empty());
        assert!(generate_drift_findings(&[]).unwrap().is_empty());
    }

    #[test]
    fn at_drift_04_duplicate_layer_is_rejected() {
        let contracts = vec![contract("A", &[("k", "1")]), contract("A", &[("k", "2")])];
        let err = generate_drift_findings(&contracts).unwrap_err();
        assert_eq!(err.reason_id, ReasonId::AcV3ReportInvalid);
        assert!(LayerContract::v1(" ", BTreeMap::new()).is_err());
    }

    #[test]
    fn at_drift_05_dot_graph_is_deterministic() {
        let contracts = vec![
            contract("Sentinel", &[("meta.canonical", "true")]),
            contract("DQSN", &[("meta.canonical", "false")]),
            contract("Core", &[("meta.canonical", "true")]),
        ];
        let findings = generate_drift_findings(&contracts).unwrap();
        let dot = render_drift_dot(&findings).unwrap();
        assert!(dot.starts_with("digraph DriftRadar {\n  rankdir=LR;\n"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains("\"Core\" -> \"DQSN\" [label=\"meta.canonical\"];"));
        assert!(dot.contains("\"DQSN\" -> \"Sentinel\" [label=\"meta.canonical\"];"));
        assert!(!dot.contains("\"Core\" -> \"Sentinel\""));

        let mut reversed = contracts.clone();
        reversed.reverse();
        let again = generate_drift_findings(&reversed).unwrap();
        assert_eq!(dot, render_drift_dot(&again).unwrap());
    }

    #[test]
    fn at_drift_06_dot_graph_names_only_drifting_layers() {
        let contracts = vec![
            contract("ZetaLayer", &[("k", "1")]),
            contract("OmegaLayer", &[("k", "1")]),
        ];
        let findings = generate_drift_findings(&contracts).unwrap();
        assert!(findings.is_empty());
        let dot = render_drift_dot(&findings).unwrap();
        assert_eq!(dot, "digraph DriftRadar {\n  rankdir=LR;\n}\n");

        let contracts = vec![
            contract("Sentinel", &[("meta.canonical", "true")]),
            contract("DQSN", &[("meta.canonical", "false")]),
            contract("Quiet", &[("other.key", "x")]),
        ];
        let dot = render_drift_dot(&generate_drift_findings(&contracts).unwrap()).unwrap();
        assert!(dot.contains("\"Sentinel\";"));
        assert!(!dot.contains("Quiet"));
    }

    #[test]
    fn at_drift_07_dot_graph_skips_other_findings_and_rejects_bare_drift() {
        let mut evidence = BTreeMap::new();
        evidence.insert("note".to_string(), EvidenceValue::from("x"));
        let spike = Finding::v1(
            "AC-FIND-REASON-SPIKE::X".to_string(),
            "spike".to_string(),
            0.5,
            evidence.clone(),
            [amg(11)].into_iter().collect(),
        )
        .unwrap();
        let dot = render_drift_dot(&[spike]).unwrap();
        assert!(!dot.contains("->"));

        let bare = Finding::v1(
            format!("{DRIFT_FINDING_PREFIX}k"),
            "drift".to_string(),
            0.5,
            evidence,
            [amg(11)].into_iter().collect(),
        )
        .unwrap();
        let err = render_drift_dot(&[bare]).unwrap_err();
        assert_eq!(err.reason_id, ReasonId::AcV3ReportInvalid);
    }
}
