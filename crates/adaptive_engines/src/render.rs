#![forbid(unsafe_code)]

use std::fmt::Write as _;

use adaptive_kernel_contracts::canonical_json::to_canonical_json;
use adaptive_kernel_contracts::report::UpgradeReport;
use adaptive_kernel_contracts::{AdaptiveRefuse, ReasonId};

use crate::canonicalize::refuse;

pub fn render_report_json(report: &UpgradeReport) -> Result<String, AdaptiveRefuse> {
    to_canonical_json(report).map_err(|err| {
        refuse(
            ReasonId::AcV3ReportInvalid,
            format!("report is not serializable: {err}"),
        )
    })
}

/// Markdown view of the report. Carries no timestamps and nothing that is not
/// already in the JSON form.
pub fn render_report_text(report: &UpgradeReport) -> Result<String, AdaptiveRefuse> {
    let mut out = String::new();
    write_report_text(report, &mut out).map_err(|_| {
        refuse(ReasonId::AcV3ReportInvalid, "report text rendering failed")
    })?;
    Ok(out)
}

fn write_report_text(report: &UpgradeReport, out: &mut String) -> std::fmt::Result {
    writeln!(out, "# ADAPTIVE CORE UPGRADE REPORT v3")?;
    writeln!(out)?;
    writeln!(out, "**Report ID:** {}", report.report_id)?;
    writeln!(out, "**Type:** {}", report.report_type.as_str())?;
    writeln!(out, "**Target Layers:** {}", report.target_layers.join(", "))?;
    writeln!(out)?;

    let caps = &report.capabilities;
    writeln!(out, "## Capabilities")?;
    writeln!(out, "- Envelope: {}", caps.envelope.as_str())?;
    writeln!(out, "- Correlation: {}", caps.correlation.as_str())?;
    writeln!(out, "- Archival: {}", caps.archival.as_str())?;
    writeln!(out, "- Telemetry: {}", caps.telemetry.as_str())?;
    writeln!(out)?;

    writeln!(out, "## Evidence Summary")?;
    writeln!(out, "- Total events: {}", report.evidence.total_events)?;
    writeln!(out)?;

    writeln!(out, "## Findings")?;
    if report.findings.is_empty() {
        writeln!(out, "- (none)")?;
    }
    for finding in &report.findings {
        writeln!(
            out,
            "- **{}** ({:?}): {}",
            finding.finding_id, finding.severity, finding.title
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## Guardrails Triggered")?;
    for id in &report.guardrails {
        let title = report
            .guardrail_titles
            .get(id)
            .map(String::as_str)
            .unwrap_or_default();
        writeln!(out, "- **{id}**: {title}")?;
    }
    writeln!(out)?;

    let b = &report.confidence_breakdown;
    writeln!(out, "## Confidence")?;
    writeln!(out, "**Score:** {:?}", report.confidence)?;
    writeln!(out, "- avg_severity: {:?}", b.avg_severity)?;
    writeln!(out, "- cross_layer_impact: {:?}", b.cross_layer_impact)?;
    writeln!(out, "- recurrence_ratio: {:?}", b.recurrence_ratio)?;
    writeln!(out, "- reproducibility: {:?}", b.reproducibility)?;
    writeln!(out)?;

    write_list(out, "Recommended Actions", &report.recommended_actions)?;
    write_list(out, "Required Tests", &report.required_tests)?;
    write_list(out, "Exit Criteria", &report.exit_criteria)?;
    write_list(out, "Forbidden Actions", &report.forbidden_actions)?;
    Ok(())
}

fn write_list(out: &mut String, heading: &str, items: &[String]) -> std::fmt::Result {
    writeln!(out, "## {heading}")?;
    if items.is_empty() {
        writeln!(out, "- (none)")?;
    }
    for item in items {
        writeln!(out, "- {item}")?;
    }
    writeln!(out)
}
