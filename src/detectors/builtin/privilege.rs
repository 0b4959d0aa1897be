use once_cell::sync::Lazy;
use regex::Regex;

use crate::artifact::{CodeArtifact, SourceLocation};
use crate::detectors::context::{
    snippet_of, window_after, window_before, window_has, OWNERSHIP_MARKER_RE, WINDOW_AFTER,
    WINDOW_BEFORE,
};
use crate::detectors::finding::{
    BusinessImpact, DetectorMetadata, DetectorType, Evidence, ExploitStep, Finding, Severity,
};
use crate::detectors::Detector;

/// TL-004: Privilege Escalation / Insecure Direct Object Reference
///
/// Flags lookups keyed by a request-controlled identifier with no
/// ownership or role check in the surrounding window. The attacker just
/// increments the id.
pub struct PrivilegeEscalationDetector;

static IDOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\.(findById|findOne|findUnique|findFirst|delete|update)\s*\(\s*[^)]*\b(req\.params|req\.query|req\.body|params\.|@Param)",
    )
    .unwrap()
});

static ROLE_MUTATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(role|isAdmin|is_admin|permissions?)\s*[:=]\s*[^;,}]*\b(req\.body|req\.query|params\.)"#)
        .unwrap()
});

impl Detector for PrivilegeEscalationDetector {
    fn metadata(&self) -> DetectorMetadata {
        DetectorMetadata {
            id: "TL-004".into(),
            name: "Privilege Escalation".into(),
            description: "Request-controlled identifier or role field used without \
                          an ownership check"
                .into(),
            detector_type: DetectorType::PrivilegeEscalation,
            default_severity: Severity::High,
            cwe_id: Some("CWE-639".into()),
        }
    }

    fn detect(&self, artifact: &CodeArtifact) -> Vec<Finding> {
        let mut findings = Vec::new();
        let lines: Vec<&str> = artifact.content.lines().collect();

        for (idx, line) in lines.iter().enumerate() {
            let (title, description) = if ROLE_MUTATION_RE.is_match(line) {
                (
                    "Role assigned from request input",
                    "A role/permission field is written directly from request data; \
                     a caller can grant themselves elevated privileges.",
                )
            } else if IDOR_RE.is_match(line) {
                if OWNERSHIP_MARKER_RE.is_match(line) {
                    continue;
                }
                let before = window_before(&lines, idx, WINDOW_BEFORE);
                let after = window_after(&lines, idx, WINDOW_AFTER);
                if window_has(&before, &OWNERSHIP_MARKER_RE)
                    || window_has(&after, &OWNERSHIP_MARKER_RE)
                {
                    continue;
                }
                (
                    "Direct object reference without ownership check",
                    "A record is fetched or mutated by a caller-supplied id with no \
                     ownership or role check nearby; ids are enumerable.",
                )
            } else {
                continue;
            };

            let location = SourceLocation::new(artifact.path.clone(), idx + 1);
            let mut finding = Finding::new(
                DetectorType::PrivilegeEscalation,
                Severity::High,
                title,
                format!("{} ({})", description, location),
            );
            finding.evidence.push(Evidence::at(location, snippet_of(line)));
            finding.exploit_chain = Some(vec![
                ExploitStep::new(
                    1,
                    "Authenticate as a low-privilege user and capture a legitimate request",
                    "Baseline request shape with the caller's own object id",
                    Severity::Low,
                ),
                ExploitStep::new(
                    2,
                    "Replay the request with another user's id (or an elevated role value)",
                    "Foreign record returned/mutated, or privileges elevated",
                    Severity::High,
                )
                .with_payload("PATCH /api/users/1337 {\"role\": \"admin\"}"),
            ]);
            finding.recommendation =
                "Scope every lookup to the authenticated principal (owner id in the \
                 query) and never accept role/permission fields from request bodies."
                    .into();
            finding.business_impact = BusinessImpact::new(7.0, 8.0, 8.0, 6.0);
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
            id: "src/users/users.service.ts".into(),
            path: PathBuf::from("src/users/users.service.ts"),
            content: content.into(),
            functions: vec![],
            imports: vec![],
            pattern_hits: vec![],
        }
    }

    #[test]
    fn flags_lookup_by_request_param() {
        let findings = PrivilegeEscalationDetector
            .detect(&artifact("const doc = await repo.findById(req.params.id);"));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn ownership_check_in_window_is_clean() {
        let content = "\
if (doc.ownerId !== req.user.id) throw new ForbiddenError();
const doc = await repo.findById(req.params.id);";
        let findings = PrivilegeEscalationDetector.detect(&artifact(content));
        assert!(findings.is_empty());
    }

    #[test]
    fn scoped_query_on_same_line_is_clean() {
        let findings = PrivilegeEscalationDetector.detect(&artifact(
            "const doc = await repo.findOne({ id: req.params.id, ownerId: req.user.id });",
        ));
        assert!(findings.is_empty());
    }

    #[test]
    fn flags_role_from_request_body() {
        let findings = PrivilegeEscalationDetector
            .detect(&artifact("user.role = req.body.role;"));
        assert_eq!(findings.len(), 1);
        assert!(findings[0].title.contains("Role"));
    }
}
