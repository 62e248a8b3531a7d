#![forbid(unsafe_code)]

use adaptive_engines::correlation::generate_correlation_findings;
use adaptive_engines::drift::{generate_drift_findings, render_drift_dot, LayerContract};
use adaptive_engines::envelope::seal_report;
use adaptive_engines::render::{render_report_json, render_report_text};
use adaptive_engines::report::{build_upgrade_report, ReportRequest};
use adaptive_kernel_contracts::correlation::CorrelationSnapshot;
use adaptive_kernel_contracts::evidence::EvidenceSnapshot;
use adaptive_kernel_contracts::report::{Capabilities, ReportEnvelope, UpgradeReport};
use adaptive_kernel_contracts::AdaptiveRefuse;

use crate::context::AdaptiveContext;

#[derive(Debug, Clone)]
pub struct PipelineRequest<'a> {
    pub report_id: &'a str,
    pub target_layers: &'a [String],
    pub snapshot: &'a EvidenceSnapshot,
    pub capabilities: Capabilities,
    /// Overrides the context's threshold for this run only.
    pub confidence_threshold: Option<f64>,
    pub correlation: Option<&'a CorrelationSnapshot>,
    pub drift_contracts: &'a [LayerContract],
    pub include_drift_graph: bool,
}

impl<'a> PipelineRequest<'a> {
    pub fn v1(
        report_id: &'a str,
        target_layers: &'a [String],
        snapshot: &'a EvidenceSnapshot,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            report_id,
            target_layers,
            snapshot,
            capabilities,
            confidence_threshold: None,
            correlation: None,
            drift_contracts: &[],
            include_drift_graph: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub report: UpgradeReport,
    pub canonical_json: String,
    pub text: String,
    pub envelope: ReportEnvelope,
}

/// Snapshot to sealed report in one pass.
///
/// Findings are ordered reason spikes, then correlation, then drift. The
/// envelope hashes exactly `canonical_json`. When requested, the drift graph
/// of the report's drift findings is appended to the text only.
pub fn run_pipeline(
    ctx: &AdaptiveContext,
    request: &PipelineRequest<'_>,
) -> Result<PipelineOutput, AdaptiveRefuse> {
    let config = ctx.config();
    let mut report_config = config.report;
    if let Some(threshold) = request.confidence_threshold {
        report_config.confidence_threshold = threshold;
    }

    let mut extra = Vec::new();
    if let Some(correlation) = request.correlation {
        extra.extend(generate_correlation_findings(correlation, &config.correlation)?);
    }
    extra.extend(generate_drift_findings(request.drift_contracts)?);

    let report = build_upgrade_report(
        ctx.registry(),
        ctx.weights(),
        &ReportRequest {
            report_id: request.report_id,
            target_layers: request.target_layers,
            snapshot: request.snapshot,
            capabilities: request.capabilities,
        },
        &report_config,
        extra,
    )?;

    let canonical_json = render_report_json(&report)?;
    let mut text = render_report_text(&report)?;
    if request.include_drift_graph {
        text.push_str("## Drift Radar\n\n```dot\n");
        text.push_str(&render_drift_dot(&report.findings)?);
        text.push_str("```\n");
    }
    let envelope = seal_report(&report, &canonical_json, ctx.signer())?;

    tracing::debug!(
        report_id = report.report_id.as_str(),
        report_type = report.report_type.as_str(),
        report_hash = envelope.report_hash.as_str(),
        "pipeline run complete"
    );
    Ok(PipelineOutput {
        report,
        canonical_json,
        text,
        envelope,
    })
}
