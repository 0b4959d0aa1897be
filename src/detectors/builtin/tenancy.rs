use crate::artifact::{CodeArtifact, SourceLocation};
use crate::detectors::context::{
    snippet_of, window_after, window_has, QUERY_RE, TENANT_MARKER_RE, WINDOW_AFTER,
};
use crate::detectors::finding::{
    BusinessImpact, DetectorMetadata, DetectorType, Evidence, ExploitStep, Finding, Severity,
};
use crate::detectors::Detector;

/// TL-005: Multi-Tenant Isolation Bypass
///
/// Flags data-access calls with no tenant-scope marker on the call line
/// or in the trailing window (where `where`-clauses and option objects
/// conventionally continue).
pub struct TenantIsolationDetector;

impl Detector for TenantIsolationDetector {
    fn metadata(&self) -> DetectorMetadata {
        DetectorMetadata {
            id: "TL-005".into(),
            name: "Tenant Isolation Bypass".into(),
            description: "Data access without a tenant-scope filter".into(),
            detector_type: DetectorType::TenantIsolation,
            default_severity: Severity::Critical,
            cwe_id: Some("CWE-285".into()),
        }
    }

    fn detect(&self, artifact: &CodeArtifact) -> Vec<Finding> {
        let mut findings = Vec::new();
        let lines: Vec<&str> = artifact.content.lines().collect();

        for (idx, line) in lines.iter().enumerate() {
            if !QUERY_RE.is_match(line) {
                continue;
            }
            if TENANT_MARKER_RE.is_match(line) {
                continue;
            }
            let after = window_after(&lines, idx, WINDOW_AFTER);
            if window_has(&after, &TENANT_MARKER_RE) {
                continue;
            }

            let location = SourceLocation::new(artifact.path.clone(), idx + 1);
            let mut finding = Finding::new(
                DetectorType::TenantIsolation,
                Severity::Critical,
                "Data access without tenant scope",
                format!(
                    "Query at {} carries no tenant filter on the call or within the \
                     {} following lines; rows from every tenant are in scope.",
                    location, WINDOW_AFTER,
                ),
            );
            finding.evidence.push(Evidence::at(location, snippet_of(line)));
            finding.exploit_chain = Some(vec![
                ExploitStep::new(
                    1,
                    "Sign up for a trial tenant to obtain a valid session",
                    "Authenticated but low-trust tenant context",
                    Severity::Low,
                ),
                ExploitStep::new(
                    2,
                    "Invoke the endpoint backed by the unscoped query",
                    "Response includes rows belonging to other tenants",
                    Severity::Critical,
                ),
                ExploitStep::new(
                    3,
                    "Iterate ids/pages to exfiltrate the full cross-tenant dataset",
                    "Bulk disclosure of other customers' data",
                    Severity::Critical,
                ),
            ]);
            finding.recommendation =
                "Add the tenant id to every query's filter (or enforce it centrally \
                 via a scoped repository/row-level security)."
                    .into();
            finding.business_impact = BusinessImpact::new(8.0, 9.0, 10.0, 6.0);
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
            id: "src/invoices/invoices.service.ts".into(),
            path: PathBuf::from("src/invoices/invoices.service.ts"),
            content: content.into(),
            functions: vec![],
            imports: vec![],
            pattern_hits: vec![],
        }
    }

    #[test]
    fn flags_unscoped_query() {
        let findings = TenantIsolationDetector
            .detect(&artifact("const invoices = await prisma.invoice.findMany();"));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[test]
    fn tenant_filter_on_call_line_is_clean() {
        let findings = TenantIsolationDetector.detect(&artifact(
            "const invoices = await prisma.invoice.findMany({ where: { tenantId } });",
        ));
        assert!(findings.is_empty());
    }

    #[test]
    fn tenant_filter_in_trailing_window_is_clean() {
        let content = "\
const invoices = await prisma.invoice.findMany({
  where: {
    tenantId: ctx.tenantId,
  },
});";
        let findings = TenantIsolationDetector.detect(&artifact(content));
        assert!(findings.is_empty());
    }

    #[test]
    fn raw_sql_without_tenant_column_is_flagged() {
        let findings = TenantIsolationDetector
            .detect(&artifact("db.query('SELECT * FROM invoices WHERE status = $1');"));
        assert_eq!(findings.len(), 1);
    }
}
