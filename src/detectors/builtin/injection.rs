use once_cell::sync::Lazy;
use regex::Regex;

use crate::artifact::{CodeArtifact, SourceLocation};
use crate::detectors::context::snippet_of;
use crate::detectors::finding::{
    BusinessImpact, DetectorMetadata, DetectorType, Evidence, ExploitStep, Finding, Severity,
};
use crate::detectors::Detector;

/// TL-006: Injection
///
/// Flags SQL built by string concatenation or template interpolation and
/// dynamic code execution on non-literal input. Parameterized queries
/// (placeholders, no interpolation) are not flagged.
pub struct InjectionDetector;

static SQL_CONCAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(query|execute|raw)\s*\(\s*(["'].*["']\s*\+|`[^`]*\$\{)"#).unwrap()
});

static SQL_TEMPLATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)`[^`]*\b(SELECT|INSERT|UPDATE|DELETE)\b[^`]*\$\{").unwrap()
});

static DYNAMIC_EXEC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(eval|Function|execSync|exec|spawn)\s*\(\s*(?:[^"'\s)][^)]*)?(\$\{|\+|req\.|params\.)"#)
        .unwrap()
});

impl Detector for InjectionDetector {
    fn metadata(&self) -> DetectorMetadata {
        DetectorMetadata {
            id: "TL-006".into(),
            name: "Injection".into(),
            description: "SQL or command built from untrusted input by concatenation \
                          or interpolation"
                .into(),
            detector_type: DetectorType::Injection,
            default_severity: Severity::Critical,
            cwe_id: Some("CWE-89".into()),
        }
    }

    fn detect(&self, artifact: &CodeArtifact) -> Vec<Finding> {
        let mut findings = Vec::new();

        for (idx, line) in artifact.content.lines().enumerate() {
            let (title, description, severity) =
                if SQL_CONCAT_RE.is_match(line) || SQL_TEMPLATE_RE.is_match(line) {
                    (
                        "SQL built from interpolated input",
                        "The query string is assembled by concatenation/interpolation; \
                         input that reaches it rewrites the statement.",
                        Severity::Critical,
                    )
                } else if DYNAMIC_EXEC_RE.is_match(line) {
                    (
                        "Dynamic execution of non-literal input",
                        "eval/exec receives a value built at runtime; input that \
                         reaches it executes as code or shell.",
                        Severity::High,
                    )
                } else {
                    continue;
                };

            let location = SourceLocation::new(artifact.path.clone(), idx + 1);
            let mut finding = Finding::new(
                DetectorType::Injection,
                severity,
                title,
                format!("{} ({})", description, location),
            );
            finding.evidence.push(Evidence::at(location, snippet_of(line)));
            finding.exploit_chain = Some(vec![
                ExploitStep::new(
                    1,
                    "Identify a request field that flows into the sink",
                    "Confirmed reflective behavior (error message or timing change)",
                    Severity::Medium,
                )
                .with_payload("' OR 1=1 --"),
                ExploitStep::new(
                    2,
                    "Escalate to data extraction or command execution",
                    "Arbitrary rows read, or shell command executed on the host",
                    Severity::Critical,
                )
                .with_payload("' UNION SELECT username, password FROM users --"),
            ]);
            finding.recommendation =
                "Use parameterized queries / prepared statements, and never pass \
                 runtime-built strings to eval or a shell."
                    .into();
            finding.business_impact = BusinessImpact::new(8.0, 8.0, 9.0, 7.0);
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
            id: "src/reports/reports.service.ts".into(),
            path: PathBuf::from("src/reports/reports.service.ts"),
            content: content.into(),
            functions: vec![],
            imports: vec![],
            pattern_hits: vec![],
        }
    }

    #[test]
    fn flags_concatenated_sql() {
        let findings = InjectionDetector.detect(&artifact(
            r#"db.query("SELECT * FROM users WHERE name = '" + name + "'");"#,
        ));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[test]
    fn flags_template_literal_sql() {
        let findings = InjectionDetector.detect(&artifact(
            "db.query(`SELECT * FROM users WHERE id = ${req.params.id}`);",
        ));
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn parameterized_query_is_clean() {
        let findings = InjectionDetector
            .detect(&artifact("db.query('SELECT * FROM users WHERE id = $1', [id]);"));
        assert!(findings.is_empty());
    }

    #[test]
    fn flags_exec_with_interpolation() {
        let findings =
            InjectionDetector.detect(&artifact("execSync(`convert ${req.query.file} out.png`);"));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn exec_of_literal_is_clean() {
        let findings = InjectionDetector.detect(&artifact("execSync('ls -la');"));
        assert!(findings.is_empty());
    }
}
