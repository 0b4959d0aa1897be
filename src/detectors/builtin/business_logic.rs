use once_cell::sync::Lazy;
use regex::Regex;

use crate::artifact::{CodeArtifact, SourceLocation};
use crate::detectors::context::{snippet_of, window_after, window_before, window_has, WINDOW_AFTER, WINDOW_BEFORE};
use crate::detectors::finding::{
    BusinessImpact, DetectorMetadata, DetectorType, Evidence, ExploitStep, Finding, Severity,
};
use crate::detectors::Detector;

/// TL-007: Business Logic / Payment Flaws
///
/// Flags client-supplied monetary fields (price, amount, total,
/// discount, quantity) used in payment or pricing logic with no
/// server-side validation in the surrounding window.
pub struct BusinessLogicDetector;

static CLIENT_MONEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(price|amount|total|discount|quantity)\s*[:=]?\s*[^;]*\breq\.(body|query)\.(price|amount|total|discount|quantity)")
        .unwrap()
});

static VALIDATION_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(validate|schema\.|zod|joi|class-validator|Math\.max|Math\.min|clamp|assert|>=?\s*0|<=?\s*0|throw)")
        .unwrap()
});

impl Detector for BusinessLogicDetector {
    fn metadata(&self) -> DetectorMetadata {
        DetectorMetadata {
            id: "TL-007".into(),
            name: "Business Logic Flaw".into(),
            description: "Client-supplied monetary value used in pricing/payment \
                          logic without server-side validation"
                .into(),
            detector_type: DetectorType::BusinessLogic,
            default_severity: Severity::High,
            cwe_id: Some("CWE-840".into()),
        }
    }

    fn detect(&self, artifact: &CodeArtifact) -> Vec<Finding> {
        let mut findings = Vec::new();
        let lines: Vec<&str> = artifact.content.lines().collect();

        for (idx, line) in lines.iter().enumerate() {
            if !CLIENT_MONEY_RE.is_match(line) {
                continue;
            }
            if VALIDATION_MARKER_RE.is_match(line) {
                continue;
            }
            let before = window_before(&lines, idx, WINDOW_BEFORE);
            let after = window_after(&lines, idx, WINDOW_AFTER);
            if window_has(&before, &VALIDATION_MARKER_RE)
                || window_has(&after, &VALIDATION_MARKER_RE)
            {
                continue;
            }

            let location = SourceLocation::new(artifact.path.clone(), idx + 1);
            let mut finding = Finding::new(
                DetectorType::BusinessLogic,
                Severity::High,
                "Client-controlled monetary value",
                format!(
                    "A price/amount field is taken from the request at {} with no \
                     validation nearby; the client sets what it pays.",
                    location,
                ),
            );
            finding.evidence.push(Evidence::at(location, snippet_of(line)));
            finding.exploit_chain = Some(vec![
                ExploitStep::new(
                    1,
                    "Intercept the checkout request in a proxy",
                    "Editable request body containing the monetary field",
                    Severity::Low,
                ),
                ExploitStep::new(
                    2,
                    "Set the field to zero, a negative value, or an absurd discount",
                    "Order accepted at the attacker-chosen price",
                    Severity::High,
                )
                .with_payload("{\"amount\": 0.01, \"discount\": 100}"),
            ]);
            finding.recommendation =
                "Recompute prices and totals server-side from canonical catalog data; \
                 only accept product ids and quantities (validated for range) from clients."
                    .into();
            finding.business_impact = BusinessImpact::new(9.0, 6.0, 5.0, 4.0);
            findings.push(finding);
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn artifact(content: &str) -> CodeArtifact {
        CodeArtifact {
            id: "src/checkout/checkout.service.ts".into(),
            path: PathBuf::from("src/checkout/checkout.service.ts"),
            content: content.into(),
            functions: vec![],
            imports: vec![],
            pattern_hits: vec![],
        }
    }

    #[test]
    fn flags_price_from_request_body() {
        let findings = BusinessLogicDetector
            .detect(&artifact("const total = req.body.amount * 100;"));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn validated_amount_is_clean() {
        let content = "\
const amount = req.body.amount;
if (amount <= 0) throw new BadRequestError();";
        let findings = BusinessLogicDetector.detect(&artifact(content));
        assert!(findings.is_empty());
    }

    #[test]
    fn server_side_price_is_clean() {
        let findings = BusinessLogicDetector
            .detect(&artifact("const total = catalog.priceOf(sku) * quantity;"));
        assert!(findings.is_empty());
    }
}
