//! Risk propagation: bounded fixed-point relaxation over the edge list.
//!
//! Each round, every edge u→v offers v a candidate score of
//! `u.risk × riskMultiplier × decay`, and v keeps the maximum. Risk
//! never decreases and never exceeds 10, so the loop terminates within
//! the round cap or earlier when a round changes nothing. This is a
//! heuristic approximation of transitive exposure, not a shortest-path
//! or max-flow computation.

use tracing::debug;

use crate::config::EngineConfig;
use crate::graph::ThreatGraph;

/// Change threshold below which a round counts as a no-op.
const EPSILON: f64 = 1e-9;

/// Relax node risk to a fixed point. Returns the number of rounds run.
pub fn propagate(graph: &mut ThreatGraph, config: &EngineConfig) -> usize {
    let edges: Vec<(String, String, f64)> = graph
        .edges
        .iter()
        .map(|e| (e.source.clone(), e.target.clone(), e.risk_multiplier))
        .collect();

    let mut rounds = 0;
    for _ in 0..config.propagation_max_rounds {
        rounds += 1;
        let mut changed = false;

        for (source, target, multiplier) in &edges {
            let Some(source_risk) = graph.node(source).map(|n| n.risk_score) else {
                continue;
            };
            let candidate =
                (source_risk * multiplier * config.propagation_decay).clamp(0.0, 10.0);
            if let Some(target_node) = graph.node_mut(target) {
                if candidate > target_node.risk_score + EPSILON {
                    target_node.set_risk(candidate);
                    changed = true;
                }
            }
        }

        if !changed {
            break;
        }
    }

    debug!(rounds, "risk propagation converged");
    rounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeType, NodeType, ThreatEdge, ThreatGraph, ThreatNode};
    use proptest::prelude::*;

    fn chain_graph(risks: &[f64], multiplier: f64) -> ThreatGraph {
        let mut graph = ThreatGraph::new();
        let mut prev: Option<String> = None;
        for (idx, &risk) in risks.iter().enumerate() {
            let name = format!("n{}", idx);
            let mut node = ThreatNode::new(NodeType::File, &name, &name);
            node.set_risk(risk);
            let id = node.id.clone();
            graph.add_node(node).unwrap();
            if let Some(prev_id) = prev {
                graph.add_edge(
                    ThreatEdge::new(EdgeType::DependsOn, &prev_id, &id)
                        .with_multiplier(multiplier),
                );
            }
            prev = Some(id);
        }
        graph
    }

    #[test]
    fn risk_flows_downstream_with_decay() {
        let mut graph = chain_graph(&[10.0, 0.0, 0.0], 1.0);
        propagate(&mut graph, &EngineConfig::default());
        assert_eq!(graph.nodes[1].risk_score, 8.0);
        assert!((graph.nodes[2].risk_score - 6.4).abs() < 1e-9);
    }

    #[test]
    fn target_keeps_higher_existing_risk() {
        let mut graph = chain_graph(&[4.0, 9.0], 1.0);
        propagate(&mut graph, &EngineConfig::default());
        assert_eq!(graph.nodes[1].risk_score, 9.0);
    }

    #[test]
    fn multiplier_amplifies_but_stays_bounded() {
        let mut graph = chain_graph(&[10.0, 0.0], 2.0);
        propagate(&mut graph, &EngineConfig::default());
        // 10 × 2.0 × 0.8 = 16, clamped.
        assert_eq!(graph.nodes[1].risk_score, 10.0);
    }

    #[test]
    fn quiet_graph_stops_after_one_round() {
        let mut graph = chain_graph(&[0.0, 0.0, 0.0], 1.0);
        let rounds = propagate(&mut graph, &EngineConfig::default());
        assert_eq!(rounds, 1);
    }

    #[test]
    fn cycle_converges_within_round_cap() {
        let mut graph = chain_graph(&[9.0, 0.0], 1.0);
        let (a, b) = (graph.nodes[0].id.clone(), graph.nodes[1].id.clone());
        graph.add_edge(ThreatEdge::new(EdgeType::DependsOn, &b, &a));
        let rounds = propagate(&mut graph, &EngineConfig::default());
        assert!(rounds <= EngineConfig::default().propagation_max_rounds);
        // Decay < 1 means the cycle cannot pump risk upward forever.
        assert_eq!(graph.nodes[0].risk_score, 9.0);
        assert!((graph.nodes[1].risk_score - 7.2).abs() < 1e-9);
    }

    #[test]
    fn round_cap_is_respected_on_long_chains() {
        let risks: Vec<f64> = std::iter::once(10.0).chain(vec![0.0; 30]).collect();
        let mut graph = chain_graph(&risks, 1.25);
        let config = EngineConfig {
            propagation_max_rounds: 3,
            ..Default::default()
        };
        let rounds = propagate(&mut graph, &config);
        assert!(rounds <= 3);
    }

    proptest! {
        /// Risk never decreases and never leaves [0,10], whatever the
        /// topology and multipliers.
        #[test]
        fn propagation_is_monotone_and_bounded(
            risks in proptest::collection::vec(0.0f64..10.0, 2..12),
            extra_edges in proptest::collection::vec((0usize..12, 0usize..12, 0.5f64..2.0), 0..20),
        ) {
            let mut graph = chain_graph(&risks, 1.0);
            let n = graph.nodes.len();
            for (source, target, multiplier) in extra_edges {
                let source_id = graph.nodes[source % n].id.clone();
                let target_id = graph.nodes[target % n].id.clone();
                graph.add_edge(
                    ThreatEdge::new(EdgeType::DataFlowsTo, &source_id, &target_id)
                        .with_multiplier(multiplier),
                );
            }

            let before: Vec<f64> = graph.nodes.iter().map(|node| node.risk_score).collect();
            propagate(&mut graph, &EngineConfig::default());

            for (node, old) in graph.nodes.iter().zip(before) {
                prop_assert!(node.risk_score + 1e-9 >= old);
                prop_assert!((0.0..=10.0).contains(&node.risk_score));
            }
        }
    }
}
