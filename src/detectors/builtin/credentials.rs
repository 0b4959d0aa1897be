use once_cell::sync::Lazy;
use regex::Regex;

use crate::artifact::{CodeArtifact, SourceLocation};
use crate::detectors::context::snippet_of;
use crate::detectors::finding::{
    BusinessImpact, DetectorMetadata, DetectorType, Evidence, ExploitStep, Finding, Severity,
};
use crate::detectors::Detector;

/// TL-001: Hardcoded Credentials
///
/// Flags string literals longer than 8 characters assigned to a
/// secret-named variable. Environment lookups, template interpolation,
/// and obvious placeholders are not flagged.
pub struct HardcodedCredentialsDetector;

/// Minimum literal length before a value looks like a real credential.
const MIN_SECRET_LEN: usize = 8;

static SECRET_ASSIGN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(secret|password|passwd|api_?key|private_?key|access_?token|auth_?token|client_?secret)\w*\s*[:=]\s*["']([^"']+)["']"#,
    )
    .unwrap()
});

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(process\.env|import\.meta\.env|\$\{|<[a-z_ -]+>|xxx+|changeme|example|placeholder|your[_-])")
        .unwrap()
});

impl Detector for HardcodedCredentialsDetector {
    fn metadata(&self) -> DetectorMetadata {
        DetectorMetadata {
            id: "TL-001".into(),
            name: "Hardcoded Credentials".into(),
            description: "Secret material embedded as a string literal in source".into(),
            detector_type: DetectorType::HardcodedCredentials,
            default_severity: Severity::Critical,
            cwe_id: Some("CWE-798".into()),
        }
    }

    fn detect(&self, artifact: &CodeArtifact) -> Vec<Finding> {
        let mut findings = Vec::new();

        for (idx, line) in artifact.content.lines().enumerate() {
            let Some(caps) = SECRET_ASSIGN_RE.captures(line) else {
                continue;
            };
            let value = &caps[2];
            if value.len() <= MIN_SECRET_LEN || PLACEHOLDER_RE.is_match(line) {
                continue;
            }

            let var_name = caps[1].to_string();
            let location = SourceLocation::new(artifact.path.clone(), idx + 1);

            let mut finding = Finding::new(
                DetectorType::HardcodedCredentials,
                Severity::Critical,
                format!("Hardcoded credential in '{}'", var_name),
                format!(
                    "A {}-character literal is assigned to '{}' in {}. Anyone with \
                     read access to the repository or its history obtains this credential.",
                    value.len(),
                    var_name,
                    artifact.path.display(),
                ),
            );
            finding.evidence.push(Evidence::at(location, snippet_of(line)));
            finding.exploit_chain = Some(vec![
                ExploitStep::new(
                    1,
                    "Clone the repository or obtain a leaked copy of the source tree",
                    "Full source text including the literal credential",
                    Severity::Medium,
                ),
                ExploitStep::new(
                    2,
                    format!("Search the tree for secret-named assignments such as '{}'", var_name),
                    "Credential value recovered without any runtime access",
                    Severity::High,
                )
                .with_payload(r#"grep -rE "(secret|api_key|password)\s*[:=]" ."#),
                ExploitStep::new(
                    3,
                    "Authenticate against the backing service with the recovered credential",
                    "Attacker holds the same privileges as the application",
                    Severity::Critical,
                ),
            ]);
            finding.recommendation =
                "Move the credential into a secret manager or environment variable and \
                 rotate it; treat the committed value as compromised."
                    .into();
            finding.business_impact = BusinessImpact::new(9.0, 8.0, 9.0, 6.0);
            findings.push(finding);
        }

        findings
    }
}
