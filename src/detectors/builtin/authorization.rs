use crate::artifact::{CodeArtifact, SourceLocation};
use crate::detectors::context::{
    snippet_of, window_before, window_has, AUTH_MARKER_RE, ROUTE_RE, WINDOW_BEFORE,
};
use crate::detectors::finding::{
    BusinessImpact, DetectorMetadata, DetectorType, Evidence, ExploitStep, Finding, Severity,
};
use crate::detectors::Detector;

/// TL-003: Missing Authorization
///
/// Flags route/handler declarations with no authorization marker in the
/// preceding context window. The window covers decorators and middleware
/// registrations that conventionally sit directly above the handler.
pub struct MissingAuthorizationDetector;

impl Detector for MissingAuthorizationDetector {
    fn metadata(&self) -> DetectorMetadata {
        DetectorMetadata {
            id: "TL-003".into(),
            name: "Missing Authorization".into(),
            description: "Request handler reachable without any authorization check".into(),
            detector_type: DetectorType::MissingAuthorization,
            default_severity: Severity::High,
            cwe_id: Some("CWE-862".into()),
        }
    }

    fn detect(&self, artifact: &CodeArtifact) -> Vec<Finding> {
        let mut findings = Vec::new();
        let lines: Vec<&str> = artifact.content.lines().collect();

        for (idx, line) in lines.iter().enumerate() {
            if !ROUTE_RE.is_match(line) {
                continue;
            }
            // Guard on the declaration line itself also counts.
            if AUTH_MARKER_RE.is_match(line) {
                continue;
            }
            let before = window_before(&lines, idx, WINDOW_BEFORE);
            if window_has(&before, &AUTH_MARKER_RE) {
                continue;
            }

            let location = SourceLocation::new(artifact.path.clone(), idx + 1);
            let mut finding = Finding::new(
                DetectorType::MissingAuthorization,
                Severity::High,
                "MISSING_AUTH: unprotected request handler",
                format!(
                    "Handler declared at {} has no authorization marker on the \
                     declaration or in the {} preceding lines; any caller can invoke it.",
                    location, WINDOW_BEFORE,
                ),
            );
            finding.evidence.push(Evidence::at(location, snippet_of(line)));
            finding.exploit_chain = Some(vec![
                ExploitStep::new(
                    1,
                    "Enumerate exposed routes from client bundles or API discovery",
                    "List of reachable handler paths",
                    Severity::Medium,
                ),
                ExploitStep::new(
                    2,
                    "Call the unprotected handler directly without credentials",
                    "Handler executes its full logic for an anonymous caller",
                    Severity::High,
                )
                .with_payload("curl -X POST https://target/api/<route>"),
            ]);
            finding.recommendation =
                "Attach the application's authorization guard (or equivalent middleware) \
                 to the handler, or mark it explicitly as intentionally public."
                    .into();
            finding.business_impact = BusinessImpact::new(6.0, 7.0, 8.0, 5.0);
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
            id: "src/orders/orders.controller.ts".into(),
            path: PathBuf::from("src/orders/orders.controller.ts"),
            content: content.into(),
            functions: vec![],
            imports: vec![],
            pattern_hits: vec![],
        }
    }

    #[test]
    fn flags_route_with_no_guard() {
        let content = "\
export class OrdersController {
  @Get(':id')
  async getOrder(@Param('id') id: string) {}
}";
        let findings = MissingAuthorizationDetector.detect(&artifact(content));
        assert_eq!(findings.len(), 1);
        assert!(findings[0].title.starts_with("MISSING_AUTH"));
        assert_eq!(findings[0].evidence[0].location.line, 2);
    }

    #[test]
    fn guard_in_preceding_window_is_clean() {
        let content = "\
export class OrdersController {
  @UseGuards(JwtAuthGuard)
  @Get(':id')
  async getOrder(@Param('id') id: string) {}
}";
        let findings = MissingAuthorizationDetector.detect(&artifact(content));
        assert!(findings.is_empty());
    }

    #[test]
    fn guard_outside_window_still_flags() {
        let mut content = String::from("@UseGuards(JwtAuthGuard)\n");
        for _ in 0..6 {
            content.push_str("// padding\n");
        }
        content.push_str("@Get(':id')\nasync getOrder() {}\n");
        let findings = MissingAuthorizationDetector.detect(&artifact(&content));
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn express_route_with_middleware_is_clean() {
        let findings = MissingAuthorizationDetector
            .detect(&artifact("router.get('/orders', requireAuth, listOrders);"));
        assert!(findings.is_empty());
    }

    #[test]
    fn express_route_without_middleware_is_flagged() {
        let findings = MissingAuthorizationDetector
            .detect(&artifact("router.get('/orders', listOrders);"));
        assert_eq!(findings.len(), 1);
    }
}
