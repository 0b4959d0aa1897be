use crate::error::Result;
use crate::AnalysisReport;

/// Render the report as pretty JSON. This is the file-boundary contract
/// consumed by downstream reporting and persistence: camelCase field
/// names, [0,10] score ranges.
pub fn render(report: &AnalysisReport) -> Result<String> {
    let json = serde_json::to_string_pretty(report)?;
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ThreatGraph;

    #[test]
    fn report_serializes_contract_shape() {
        let report = AnalysisReport {
            target_name: "demo".into(),
            findings: vec![],
            graph: ThreatGraph::new(),
        };
        let rendered = render(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert!(value.get("findings").is_some());
        assert!(value["graph"].get("criticalPaths").is_some());
        assert!(value["graph"].get("vulnerabilities").is_some());
        assert!(value["graph"].get("riskScore").is_some());
    }
}
