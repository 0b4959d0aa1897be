//! Posture aggregation: fold node risk, vulnerability severity, and
//! path risk into one overall score.

use tracing::debug;

use crate::detectors::Severity;
use crate::graph::{CriticalPath, NodeType, ThreatGraph};

/// Per-critical-vulnerability addition to the weighted mean.
const CRITICAL_VULN_WEIGHT: f64 = 0.5;
/// Per-high-risk-path addition to the weighted mean.
const HIGH_RISK_PATH_WEIGHT: f64 = 0.3;
/// Paths at or above this score count as high-risk.
const HIGH_RISK_PATH_THRESHOLD: f64 = 8.0;

/// Fixed weight per node type in the risk mean.
fn node_type_weight(node_type: NodeType) -> f64 {
    match node_type {
        NodeType::Endpoint => 3.0,
        NodeType::Secret => 3.0,
        NodeType::DatabaseQuery => 2.5,
        NodeType::TrustBoundary => 2.5,
        NodeType::ExternalService => 2.0,
        NodeType::Container | NodeType::Role | NodeType::Policy => 2.0,
        NodeType::Function => 1.5,
        NodeType::File => 1.0,
    }
}

/// Overall posture score in [0,10]: weighted mean of node risk, plus
/// fixed increments per critical vulnerability and high-risk path,
/// clamped as the final step.
pub fn overall_risk(graph: &ThreatGraph, paths: &[CriticalPath]) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for node in &graph.nodes {
        let weight = node_type_weight(node.node_type);
        weighted_sum += node.risk_score * weight;
        weight_total += weight;
    }
    let base = if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    };

    let critical_vulns = graph
        .vulnerabilities
        .iter()
        .filter(|v| v.severity == Severity::Critical)
        .count() as f64;
    let high_risk_paths = paths
        .iter()
        .filter(|p| p.risk_score >= HIGH_RISK_PATH_THRESHOLD)
        .count() as f64;

    let score =
        base + CRITICAL_VULN_WEIGHT * critical_vulns + HIGH_RISK_PATH_WEIGHT * high_risk_paths;
    let clamped = score.clamp(0.0, 10.0);
    debug!(base, critical_vulns, high_risk_paths, score = clamped, "posture aggregated");
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::{BusinessImpact, DetectorType};
    use crate::graph::{stable_id, ThreatNode, Vulnerability};
    use proptest::prelude::*;

    fn node_with_risk(node_type: NodeType, name: &str, risk: f64) -> ThreatNode {
        let mut node = ThreatNode::new(node_type, name, name);
        node.set_risk(risk);
        node
    }

    fn vulnerability(severity: Severity) -> Vulnerability {
        Vulnerability {
            id: "v".into(),
            node_id: "n".into(),
            detector_type: DetectorType::Injection,
            severity,
            title: "t".into(),
            description: "d".into(),
            exploit_scenario: "s".into(),
            business_impact: BusinessImpact::default(),
        }
    }

    fn path_with_risk(risk: f64) -> CriticalPath {
        CriticalPath {
            id: stable_id("path", &risk.to_string()),
            nodes: vec![],
            edges: vec![],
            risk_score: risk,
            exploitability: 5.0,
            impact: 5.0,
            description: String::new(),
        }
    }

    #[test]
    fn empty_graph_scores_zero() {
        let graph = ThreatGraph::new();
        assert_eq!(overall_risk(&graph, &[]), 0.0);
    }

    #[test]
    fn weighted_mean_favors_endpoints_over_files() {
        let mut graph = ThreatGraph::new();
        graph.add_node(node_with_risk(NodeType::Endpoint, "ep", 10.0)).unwrap();
        graph.add_node(node_with_risk(NodeType::File, "f", 0.0)).unwrap();
        // (10×3 + 0×1) / 4 = 7.5
        assert!((overall_risk(&graph, &[]) - 7.5).abs() < 1e-9);
    }

    #[test]
    fn critical_vulnerabilities_raise_the_score() {
        let mut graph = ThreatGraph::new();
        graph.add_node(node_with_risk(NodeType::File, "f", 4.0)).unwrap();
        graph.vulnerabilities.push(vulnerability(Severity::Critical));
        graph.vulnerabilities.push(vulnerability(Severity::High));
        // 4.0 + 0.5×1 (only the critical one counts)
        assert!((overall_risk(&graph, &[]) - 4.5).abs() < 1e-9);
    }

    #[test]
    fn high_risk_paths_raise_the_score() {
        let mut graph = ThreatGraph::new();
        graph.add_node(node_with_risk(NodeType::File, "f", 4.0)).unwrap();
        let paths = vec![path_with_risk(8.5), path_with_risk(7.9)];
        // 4.0 + 0.3×1
        assert!((overall_risk(&graph, &paths) - 4.3).abs() < 1e-9);
    }

    proptest! {
        /// The aggregate is clamped no matter how many vulnerabilities
        /// or high-risk paths pile up.
        #[test]
        fn aggregate_always_in_range(
            risks in proptest::collection::vec(0.0f64..10.0, 0..20),
            criticals in 0usize..100,
            path_count in 0usize..100,
        ) {
            let mut graph = ThreatGraph::new();
            for (idx, risk) in risks.iter().enumerate() {
                graph
                    .add_node(node_with_risk(NodeType::Endpoint, &format!("n{}", idx), *risk))
                    .unwrap();
            }
            for _ in 0..criticals {
                graph.vulnerabilities.push(vulnerability(Severity::Critical));
            }
            let paths: Vec<CriticalPath> = (0..path_count).map(|_| path_with_risk(9.0)).collect();

            let score = overall_risk(&graph, &paths);
            prop_assert!((0.0..=10.0).contains(&score));
        }
    }
}
