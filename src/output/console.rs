use crate::detectors::{Finding, Severity};
use crate::AnalysisReport;

/// Render a human-readable summary: findings grouped by severity, then
/// the graph posture and the top critical paths.
pub fn render(report: &AnalysisReport) -> String {
    let mut output = String::new();

    if report.findings.is_empty() {
        output.push_str("\n  No security findings detected.\n");
    } else {
        // Sort by severity (critical first), then by file path.
        let mut sorted: Vec<&Finding> = report.findings.iter().collect();
        sorted.sort_by(|a, b| {
            b.severity.cmp(&a.severity).then_with(|| {
                let a_file = a.location().map(|l| &l.file);
                let b_file = b.location().map(|l| &l.file);
                a_file.cmp(&b_file)
            })
        });

        output.push_str(&format!(
            "\n  {} finding(s) detected:\n\n",
            report.findings.len()
        ));

        for finding in &sorted {
            let severity_tag = match finding.severity {
                Severity::Critical => "[CRITICAL]",
                Severity::High => "[HIGH]    ",
                Severity::Medium => "[MEDIUM]  ",
                Severity::Low => "[LOW]     ",
                Severity::Info => "[INFO]    ",
            };
            let location = finding
                .location()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "-".into());

            output.push_str(&format!(
                "  {} {} {}\n",
                severity_tag, finding.detector_type, finding.title
            ));
            output.push_str(&format!("           at {}\n", location));
            if !finding.recommendation.is_empty() {
                output.push_str(&format!("           fix: {}\n", finding.recommendation));
            }
            output.push('\n');
        }
    }

    let graph = &report.graph;
    output.push_str(&format!(
        "\n  Threat graph: {} nodes, {} edges, {} vulnerabilities\n",
        graph.nodes.len(),
        graph.edges.len(),
        graph.vulnerabilities.len(),
    ));

    if !graph.critical_paths.is_empty() {
        output.push_str(&format!(
            "  Critical paths ({} total, top {}):\n",
            graph.critical_paths.len(),
            graph.critical_paths.len().min(5),
        ));
        for path in graph.critical_paths.iter().take(5) {
            output.push_str(&format!(
                "    risk {:>4.1}  exploitability {:>4.1}  impact {:>4.1}  {}\n",
                path.risk_score, path.exploitability, path.impact, path.description,
            ));
        }
    }

    output.push_str(&format!(
        "\n  Overall posture risk: {:.1} / 10\n\n",
        graph.risk_score
    ));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::SourceLocation;
    use crate::detectors::{DetectorType, Evidence};
    use crate::graph::ThreatGraph;

    #[test]
    fn empty_report_renders_clean_message() {
        let report = AnalysisReport {
            target_name: "demo".into(),
            findings: vec![],
            graph: ThreatGraph::new(),
        };
        let rendered = render(&report);
        assert!(rendered.contains("No security findings"));
        assert!(rendered.contains("Overall posture risk: 0.0"));
    }

    #[test]
    fn findings_sorted_critical_first() {
        let mut high = Finding::new(
            DetectorType::MissingAuthorization,
            Severity::High,
            "MISSING_AUTH: x",
            "d",
        );
        high.evidence
            .push(Evidence::at(SourceLocation::new("a.ts", 1), "snippet"));
        let mut critical = Finding::new(
            DetectorType::TenantIsolation,
            Severity::Critical,
            "Data access without tenant scope",
            "d",
        );
        critical
            .evidence
            .push(Evidence::at(SourceLocation::new("b.ts", 2), "snippet"));

        let report = AnalysisReport {
            target_name: "demo".into(),
            findings: vec![high, critical],
            graph: ThreatGraph::new(),
        };
        let rendered = render(&report);
        let critical_pos = rendered.find("[CRITICAL]").unwrap();
        let high_pos = rendered.find("[HIGH]").unwrap();
        assert!(critical_pos < high_pos);
    }
}
