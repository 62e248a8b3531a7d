#![forbid(unsafe_code)]

use adaptive_kernel_contracts::canonical_json::sha256_hex;
use adaptive_kernel_contracts::report::{ReportEnvelope, UpgradeReport, SIGNATURE_ABSENT};
use adaptive_kernel_contracts::{AdaptiveRefuse, ReasonId};

use crate::canonicalize::refuse;
use crate::render::render_report_json;

/// Signature slots for a sealed report. Both slots receive the report hash and
/// return an opaque, non-blank string.
pub trait ReportSigner {
    fn classical_signature(&self, report_hash: &str) -> Result<String, AdaptiveRefuse>;
    fn pqc_signature(&self, report_hash: &str) -> Result<String, AdaptiveRefuse>;
}

/// Leaves both slots as `ABSENT`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSigner;

impl ReportSigner for NoopSigner {
    fn classical_signature(&self, _report_hash: &str) -> Result<String, AdaptiveRefuse> {
        Ok(SIGNATURE_ABSENT.to_string())
    }

    fn pqc_signature(&self, _report_hash: &str) -> Result<String, AdaptiveRefuse> {
        Ok(SIGNATURE_ABSENT.to_string())
    }
}

/// Seals `canonical_json`, which must be the canonical rendering of `report`.
/// Any other text is refused rather than hashed.
pub fn seal_report(
    report: &UpgradeReport,
    canonical_json: &str,
    signer: &dyn ReportSigner,
) -> Result<ReportEnvelope, AdaptiveRefuse> {
    if render_report_json(report)? != canonical_json {
        return Err(refuse(
            ReasonId::AcV3ReportInvalid,
            format!(
                "canonical_json does not match report {}",
                report.report_id
            ),
        ));
    }
    let report_hash = sha256_hex(canonical_json);
    let envelope = ReportEnvelope::v1(
        report_hash.clone(),
        signer.classical_signature(&report_hash)?,
        signer.pqc_signature(&report_hash)?,
    )
    .map_err(|violation| AdaptiveRefuse::from_violation(ReasonId::AcV3ReportInvalid, &violation))?;

    tracing::debug!(
        report_id = report.report_id.as_str(),
        report_hash = envelope.report_hash.as_str(),
        signed = envelope.is_signed(),
        "report sealed"
    );
    Ok(envelope)
}

/// Unsigned seal.
pub fn create_report_envelope(
    report: &UpgradeReport,
    canonical_json: &str,
) -> Result<ReportEnvelope, AdaptiveRefuse> {
    seal_report(report, canonical_json, &NoopSigner)
}

/// True when `canonical_json` hashes to the sealed value. Signatures are not
/// checked here.
pub fn verify_envelope_hash(envelope: &ReportEnvelope, canonical_json: &str) -> bool {
    sha256_hex(canonical_json) == envelope.report_hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptive_kernel_contracts::evidence::{CountMap, EvidenceSnapshot};
    use adaptive_kernel_contracts::report::Capabilities;

    use crate::confidence::ConfidenceWeights;
    use crate::guardrails::GuardrailRegistry;
    use crate::report::{build_upgrade_report, ReportBuilderConfig, ReportRequest};

    fn report() -> UpgradeReport {
        let counts = || [("SPIKE", 10u64)].into_iter().collect::<CountMap>();
        let snap = EvidenceSnapshot::v1(10, counts(), counts(), counts()).unwrap();
        let layers = vec!["DQSN".to_string()];
        build_upgrade_report(
            &GuardrailRegistry::load_default().unwrap(),
            &ConfidenceWeights::load_default().unwrap(),
            &ReportRequest {
                report_id: "AC-UR-2026-STEP5",
                target_layers: &layers,
                snapshot: &snap,
                capabilities: Capabilities::minimal(),
            },
            &ReportBuilderConfig::mvp_v1().with_threshold(0.0),
            Vec::new(),
        )
        .unwrap()
    }

    struct FixedSigner;

    impl ReportSigner for FixedSigner {
        fn classical_signature(&self, report_hash: &str) -> Result<String, AdaptiveRefuse> {
            Ok(format!("ed25519:{}", &report_hash[..8]))
        }

        fn pqc_signature(&self, _report_hash: &str) -> Result<String, AdaptiveRefuse> {
            Ok(" ".to_string())
        }
    }

    #[test]
    fn at_envelope_01_hash_is_deterministic_and_unsigned() {
        let r = report();
        let json1 = render_report_json(&r).unwrap();
        let json2 = render_report_json(&r).unwrap();
        let env1 = create_report_envelope(&r, &json1).unwrap();
        let env2 = create_report_envelope(&r, &json2).unwrap();
        assert_eq!(env1, env2);
        assert_eq!(env1.classical_signature, "ABSENT");
        assert_eq!(env1.pqc_signature, "ABSENT");
        assert!(!env1.is_signed());
        assert!(verify_envelope_hash(&env1, &json1));
        assert!(!verify_envelope_hash(&env1, &json1.replace("DQSN", "dqsn")));
    }

    #[test]
    fn at_envelope_02_mismatched_json_is_refused() {
        let r = report();
        let err = create_report_envelope(&r, "{}").unwrap_err();
        assert_eq!(err.reason_id, ReasonId::AcV3ReportInvalid);
    }

    #[test]
    fn at_envelope_03_blank_signature_from_signer_is_refused() {
        let r = report();
        let json = render_report_json(&r).unwrap();
        let err = seal_report(&r, &json, &FixedSigner).unwrap_err();
        assert_eq!(err.reason_id, ReasonId::AcV3ReportInvalid);
    }
}
