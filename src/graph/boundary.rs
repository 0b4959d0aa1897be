//! Trust boundary analysis: seed risk at externally reachable nodes and
//! elevate everything they can reach.
//!
//! Single pass, not iterated to convergence — it primes the graph before
//! propagation, it does not replace it.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::EngineConfig;
use crate::graph::{ExposureLevel, NodeType, ThreatGraph};

/// Apply boundary bonuses in place. Every write stays within [0,10].
pub fn analyze(graph: &mut ThreatGraph, config: &EngineConfig) {
    let boundary_ids: Vec<String> = graph
        .nodes
        .iter()
        .filter(|n| {
            matches!(n.node_type, NodeType::Endpoint | NodeType::ExternalService)
                || n.metadata.exposure_level == ExposureLevel::Public
        })
        .map(|n| n.id.clone())
        .collect();

    let adjacency = outgoing_targets(graph);
    for boundary_id in &boundary_ids {
        if let Some(node) = graph.node_mut(boundary_id) {
            node.bump_risk(config.boundary_bonus);
        }
        for reached in reachable_from(&adjacency, boundary_id) {
            if let Some(node) = graph.node_mut(&reached) {
                node.bump_risk(config.reachable_bonus);
            }
        }
    }

    debug!(boundaries = boundary_ids.len(), "trust boundary pass complete");
}

/// Outgoing adjacency owned by the caller, built once per pass so the
/// walks below do not hold a borrow of the graph while it is mutated.
fn outgoing_targets(graph: &ThreatGraph) -> HashMap<String, Vec<String>> {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    for edge in &graph.edges {
        adjacency
            .entry(edge.source.clone())
            .or_default()
            .push(edge.target.clone());
    }
    adjacency
}

/// Depth-first reachable set over outgoing edges, excluding the start
/// node. Cycle-safe via the visited set.
fn reachable_from(adjacency: &HashMap<String, Vec<String>>, start: &str) -> Vec<String> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![start];
    visited.insert(start);

    let mut reached = Vec::new();
    while let Some(current) = stack.pop() {
        if let Some(neighbors) = adjacency.get(current) {
            for target in neighbors {
                if visited.insert(target) {
                    reached.push(target.clone());
                    stack.push(target);
                }
            }
        }
    }
    reached
}
