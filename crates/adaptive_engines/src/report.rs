#![forbid(unsafe_code)]

use std::collections::{BTreeSet, HashSet};

use adaptive_kernel_contracts::evidence::EvidenceSnapshot;
use adaptive_kernel_contracts::finding::Finding;
use adaptive_kernel_contracts::report::{
    Capabilities, ConfidenceBreakdown, ReportType, UpgradeReport,
};
use adaptive_kernel_contracts::{AdaptiveRefuse, ReasonId, Validate};

use crate::analyze::{generate_findings, round6, AnalyzeConfig};
use crate::canonicalize::refuse;
use crate::confidence::{compute_confidence, ConfidenceInputs, ConfidenceWeights};
use crate::guardrails::GuardrailRegistry;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.60;

/// Layer count at which the cross-layer impact proxy saturates.
pub const CROSS_LAYER_SATURATION: f64 = 5.0;

/// Reproducibility proxy once at least one finding exists. Provisional.
pub const REPRODUCIBILITY_WITH_FINDINGS: f64 = 0.5;

const NOTICE_ACTIONS: [&str; 2] = [
    "Collect more evidence for recurring reason codes and anomalies.",
    "Add detectors or instrumentation in upstream layers to increase signal quality.",
];
const NOTICE_REQUIRED_TESTS: [&str; 0] = [];
const NOTICE_EXIT_CRITERIA: [&str; 2] = [
    "Confidence must meet threshold before emitting an Upgrade Report.",
    "All evidence and findings must remain deterministic and reproducible.",
];
const NOTICE_FORBIDDEN: [&str; 2] = [
    "Do not relax validation to increase event acceptance.",
    "Do not apply any code changes based on low-confidence notices.",
];

const UPGRADE_ACTIONS: [&str; 3] = [
    "Harden validation/canonicalization at the boundary where the spike occurs.",
    "Eliminate ambiguous defaults; require explicit inputs or fail closed.",
    "Add negative tests to reproduce the observed failure mode and lock regression.",
];
const UPGRADE_REQUIRED_TESTS: [&str; 2] = [
    "Add a negative test that fails on current behavior and passes after the fix.",
    "Add a regression lock referencing this report_id.",
];
const UPGRADE_EXIT_CRITERIA: [&str; 3] = [
    "New tests MUST fail on the prior version and pass after the fix.",
    "Coverage must not regress (≥ project threshold).",
    "No silent fallbacks; all rejects must emit explicit reason codes.",
];
const UPGRADE_FORBIDDEN: [&str; 3] = [
    "Do not relax validation rules.",
    "Do not introduce silent defaults.",
    "Do not auto-apply changes; human review is mandatory.",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportBuilderConfig {
    pub confidence_threshold: f64,
    pub analyze: AnalyzeConfig,
}

impl ReportBuilderConfig {
    pub fn mvp_v1() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            analyze: AnalyzeConfig::mvp_v1(),
        }
    }

    pub fn with_threshold(mut self, confidence_threshold: f64) -> Self {
        self.confidence_threshold = confidence_threshold;
        self
    }
}

impl Default for ReportBuilderConfig {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReportRequest<'a> {
    pub report_id: &'a str,
    pub target_layers: &'a [String],
    pub snapshot: &'a EvidenceSnapshot,
    pub capabilities: Capabilities,
}

/// Builds the advisory report for one snapshot.
///
/// Reason-spike findings come first, then `extra_findings` in the order given.
/// Every cited guardrail must be registered. Confidence below the threshold
/// yields a collection notice, which is a success and not an error.
pub fn build_upgrade_report(
    registry: &GuardrailRegistry,
    weights: &ConfidenceWeights,
    request: &ReportRequest<'_>,
    config: &ReportBuilderConfig,
    extra_findings: Vec<Finding>,
) -> Result<UpgradeReport, AdaptiveRefuse> {
    let report_id = request.report_id;
    if report_id.trim().is_empty() {
        return Err(refuse(ReasonId::AcV3ReportInvalid, "report_id must not be blank"));
    }
    if request.target_layers.is_empty() {
        return Err(refuse(
            ReasonId::AcV3ReportInvalid,
            "target_layers must not be empty",
        ));
    }
    if request.target_layers.iter().any(|l| l.trim().is_empty()) {
        return Err(refuse(
            ReasonId::AcV3ReportInvalid,
            "target_layers must not contain blank entries",
        ));
    }
    let threshold = config.confidence_threshold;
    if !threshold.is_finite() {
        return Err(refuse(
            ReasonId::AcV3ReportInvalid,
            format!("confidence_threshold {threshold} is not finite"),
        ));
    }
    let snapshot = request.snapshot;
    snapshot
        .validate()
        .map_err(|violation| AdaptiveRefuse::from_violation(ReasonId::AcV3ReportInvalid, &violation))?;

    // Sorted, duplicates kept: each entry counts toward cross-layer impact.
    let mut target_layers = request.target_layers.to_vec();
    target_layers.sort();

    let mut findings = generate_findings(snapshot, &config.analyze)?;
    findings.extend(extra_findings);
    let mut seen = HashSet::new();
    for finding in &findings {
        if !seen.insert(finding.finding_id.as_str()) {
            return Err(refuse(
                ReasonId::AcV3ReportInvalid,
                format!("duplicate finding {}", finding.finding_id),
            ));
        }
    }

    let recurrence_ratio = if snapshot.total_events == 0 {
        0.0
    } else {
        snapshot.by_upstream_reason_id.max_count().unwrap_or(0) as f64 / snapshot.total_events as f64
    };
    let avg_severity = findings.iter().map(|f| f.severity).fold(0.0, f64::max);
    let reproducibility = if findings.is_empty() {
        0.0
    } else {
        REPRODUCIBILITY_WITH_FINDINGS
    };
    let cross_layer_impact = (target_layers.len() as f64 / CROSS_LAYER_SATURATION).min(1.0);

    let inputs = ConfidenceInputs {
        recurrence_ratio,
        avg_severity,
        reproducibility,
        cross_layer_impact,
    }
    .clamped();
    let confidence = compute_confidence(&inputs, weights);

    let guardrails = findings
        .iter()
        .flat_map(|f| f.guardrails.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();
    registry.require_all(&guardrails)?;
    let guardrail_titles = registry.titles_for(&guardrails);

    let report_type = if confidence < threshold {
        ReportType::SignalCollectionNotice
    } else {
        ReportType::UpgradeReport
    };
    let (actions, tests, exit, forbidden): (&[&str], &[&str], &[&str], &[&str]) =
        match report_type {
            ReportType::SignalCollectionNotice => (
                &NOTICE_ACTIONS[..],
                &NOTICE_REQUIRED_TESTS[..],
                &NOTICE_EXIT_CRITERIA[..],
                &NOTICE_FORBIDDEN[..],
            ),
            ReportType::UpgradeReport => (
                &UPGRADE_ACTIONS[..],
                &UPGRADE_REQUIRED_TESTS[..],
                &UPGRADE_EXIT_CRITERIA[..],
                &UPGRADE_FORBIDDEN[..],
            ),
        };

    let report = UpgradeReport {
        report_id: report_id.to_string(),
        report_type,
        target_layers,
        evidence: snapshot.clone(),
        findings,
        guardrails,
        guardrail_titles,
        confidence: round6(confidence),
        confidence_breakdown: ConfidenceBreakdown {
            recurrence_ratio: round6(inputs.recurrence_ratio),
            avg_severity: round6(inputs.avg_severity),
            reproducibility: round6(inputs.reproducibility),
            cross_layer_impact: round6(inputs.cross_layer_impact),
        },
        capabilities: request.capabilities,
        recommended_actions: owned(actions),
        required_tests: owned(tests),
        exit_criteria: owned(exit),
        forbidden_actions: owned(forbidden),
    };
    report
        .validate()
        .map_err(|violation| AdaptiveRefuse::from_violation(ReasonId::AcV3ReportInvalid, &violation))?;

    tracing::debug!(
        report_id,
        report_type = report_type.as_str(),
        confidence = report.confidence,
        findings = report.findings.len(),
        guardrails = report.guardrails.len(),
        "report built"
    );
    Ok(report)
}

fn owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}
