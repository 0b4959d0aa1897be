use once_cell::sync::Lazy;
use regex::Regex;

use crate::artifact::{CodeArtifact, SourceLocation};
use crate::detectors::context::snippet_of;
use crate::detectors::finding::{
    BusinessImpact, DetectorMetadata, DetectorType, Evidence, ExploitStep, Finding, Severity,
};
use crate::detectors::Detector;

/// TL-002: Broken Token Handling
///
/// Flags token/session handling that defeats the point of the token:
/// decoding a JWT without verifying its signature, explicitly disabling
/// verification, persisting bearer tokens to browser storage, and
/// signing tokens with no expiry.
pub struct TokenHandlingDetector;

static DECODE_NO_VERIFY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bjwt\.decode\s*\(").unwrap());

static VERIFY_DISABLED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(verify\s*[:=]\s*false|ignoreExpiration\s*[:=]\s*true|algorithms\s*[:=]\s*\[\s*["']none["'])"#)
        .unwrap()
});

static STORAGE_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(localStorage|sessionStorage)\.setItem\s*\(\s*[^)]*(token|jwt|session)")
        .unwrap()
});

static SIGN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bjwt\.sign\s*\(").unwrap());

static EXPIRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(expiresIn|exp\s*[:=]|maxAge)").unwrap());

impl Detector for TokenHandlingDetector {
    fn metadata(&self) -> DetectorMetadata {
        DetectorMetadata {
            id: "TL-002".into(),
            name: "Broken Token Handling".into(),
            description: "Token decoded without verification, verification disabled, \
                          token persisted to browser storage, or signed without expiry"
                .into(),
            detector_type: DetectorType::TokenHandling,
            default_severity: Severity::High,
            cwe_id: Some("CWE-347".into()),
        }
    }

    fn detect(&self, artifact: &CodeArtifact) -> Vec<Finding> {
        let mut findings = Vec::new();
        let lines: Vec<&str> = artifact.content.lines().collect();

        for (idx, line) in lines.iter().enumerate() {
            let issue = if DECODE_NO_VERIFY_RE.is_match(line) {
                Some((
                    "JWT decoded without signature verification",
                    "jwt.decode() reads claims without checking the signature; any \
                     caller can forge arbitrary claims.",
                ))
            } else if VERIFY_DISABLED_RE.is_match(line) {
                Some((
                    "Token verification explicitly disabled",
                    "Signature or expiry verification is switched off, so forged or \
                     expired tokens are accepted as valid.",
                ))
            } else if STORAGE_TOKEN_RE.is_match(line) {
                Some((
                    "Bearer token persisted to browser storage",
                    "Tokens in localStorage/sessionStorage are readable by any \
                     injected script, turning XSS into full session theft.",
                ))
            } else if SIGN_RE.is_match(line) && !EXPIRY_RE.is_match(line) {
                // Only flag when no expiry appears on the sign call itself or
                // the immediately following options lines.
                let tail = lines[idx..lines.len().min(idx + 3)].join(" ");
                if EXPIRY_RE.is_match(&tail) {
                    None
                } else {
                    Some((
                        "Token signed without expiry",
                        "jwt.sign() without expiresIn produces tokens that never \
                         expire; a single leak grants permanent access.",
                    ))
                }
            } else {
                None
            };

            let Some((title, description)) = issue else {
                continue;
            };

            let location = SourceLocation::new(artifact.path.clone(), idx + 1);
            let mut finding = Finding::new(
                DetectorType::TokenHandling,
                Severity::High,
                title,
                format!("{} ({})", description, artifact.path.display()),
            );
            finding.evidence.push(Evidence::at(location, snippet_of(line)));
            finding.exploit_chain = Some(vec![
                ExploitStep::new(
                    1,
                    "Obtain or forge a token accepted by the weakened verification path",
                    "A token the service treats as authentic",
                    Severity::High,
                ),
                ExploitStep::new(
                    2,
                    "Replay the token against authenticated endpoints",
                    "Requests execute under the impersonated identity",
                    Severity::High,
                ),
            ]);
            finding.recommendation =
                "Always verify signatures with jwt.verify(), set an expiry on every \
                 token, and keep tokens in httpOnly cookies rather than browser storage."
                    .into();
            finding.business_impact = BusinessImpact::new(7.0, 7.0, 6.0, 5.0);
            findings.push(finding);
        }

        findings
    }
}
