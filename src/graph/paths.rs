//! Critical path enumeration: bounded depth-first search from exposed
//! nodes to sensitive nodes over the stabilized graph.
//!
//! Each traversal owns its visited set (push/pop discipline), so
//! enumeration from independent sources is parallel-safe and cycles in
//! the graph cannot trap it.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::debug;

use crate::config::EngineConfig;
use crate::graph::{stable_id, CriticalPath, ExposureLevel, NodeType, ThreatGraph, ThreatNode};

/// Exploitability penalty for each private/privileged node on the path.
const EXPOSURE_PENALTY: f64 = 2.0;
/// Exploitability penalty for each tenant-isolated node on the path.
const TENANT_PENALTY: f64 = 1.0;
/// Exploitability never drops below this floor.
const EXPLOITABILITY_FLOOR: f64 = 1.0;
/// Risk threshold for a sink to qualify on score alone.
const SINK_RISK_THRESHOLD: f64 = 8.0;

/// Enumerate, score, filter, and rank attack paths.
pub fn find_critical_paths(graph: &ThreatGraph, config: &EngineConfig) -> Vec<CriticalPath> {
    let sources: Vec<&ThreatNode> = graph
        .nodes
        .iter()
        .filter(|n| n.metadata.exposure_level == ExposureLevel::Public)
        .collect();

    let adjacency = graph.outgoing();

    let mut paths: Vec<CriticalPath> = sources
        .par_iter()
        .map(|source| enumerate_from(graph, &adjacency, source, config))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect();

    paths.retain(|p| p.risk_score >= config.min_path_risk);
    // Stable sort: ties keep discovery order.
    paths.sort_by(|a, b| {
        b.risk_score
            .partial_cmp(&a.risk_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    paths.truncate(config.max_total_paths);

    debug!(paths = paths.len(), sources = sources.len(), "critical paths ranked");
    paths
}

fn is_sink(node: &ThreatNode) -> bool {
    matches!(node.node_type, NodeType::Secret | NodeType::DatabaseQuery)
        || node.risk_score >= SINK_RISK_THRESHOLD
}

/// DFS from one source, emitting a path each time a sink is reached.
/// Per-(source, sink) emission is capped; the visited set is local to
/// the walk and maintained push/pop.
fn enumerate_from(
    graph: &ThreatGraph,
    adjacency: &HashMap<&str, Vec<(usize, &str)>>,
    source: &ThreatNode,
    config: &EngineConfig,
) -> Vec<CriticalPath> {
    let mut walker = Walker {
        graph,
        adjacency,
        config,
        node_path: vec![source.id.clone()],
        edge_path: Vec::new(),
        per_sink: HashMap::new(),
        emitted: Vec::new(),
    };
    walker.walk(&source.id);
    walker.emitted
}

struct Walker<'a> {
    graph: &'a ThreatGraph,
    adjacency: &'a HashMap<&'a str, Vec<(usize, &'a str)>>,
    config: &'a EngineConfig,
    /// Current path; doubles as the visited set (paths are short).
    node_path: Vec<String>,
    edge_path: Vec<String>,
    per_sink: HashMap<String, usize>,
    emitted: Vec<CriticalPath>,
}

impl Walker<'_> {
    fn walk(&mut self, current: &str) {
        if self.node_path.len() >= self.config.max_path_hops {
            return;
        }
        let Some(neighbors) = self.adjacency.get(current) else {
            return;
        };
        // Clone the neighbor list indices; the borrow must not outlive
        // the recursive mutation of the walker.
        let neighbors: Vec<(usize, String)> = neighbors
            .iter()
            .map(|&(edge_idx, target)| (edge_idx, target.to_string()))
            .collect();

        for (edge_idx, target) in neighbors {
            if self.node_path.iter().any(|id| *id == target) {
                continue;
            }
            let Some(target_node) = self.graph.node(&target) else {
                continue;
            };

            self.node_path.push(target.clone());
            self.edge_path.push(self.graph.edges[edge_idx].id.clone());

            if is_sink(target_node) {
                let count = self.per_sink.entry(target.clone()).or_insert(0);
                if *count < self.config.max_paths_per_pair {
                    *count += 1;
                    self.emit();
                }
            }
            self.walk(&target);

            self.edge_path.pop();
            self.node_path.pop();
        }
    }

    fn emit(&mut self) {
        let nodes: Vec<&ThreatNode> = self
            .node_path
            .iter()
            .filter_map(|id| self.graph.node(id))
            .collect();

        let risk_score =
            nodes.iter().map(|n| n.risk_score).sum::<f64>() / nodes.len() as f64;
        let impact = nodes
            .iter()
            .map(|n| n.metadata.business_criticality)
            .fold(0.0, f64::max);

        let mut exploitability = 10.0;
        for node in &nodes {
            if matches!(
                node.metadata.exposure_level,
                ExposureLevel::Private | ExposureLevel::Privileged
            ) {
                exploitability -= EXPOSURE_PENALTY;
            }
            if node.metadata.tenant_isolation {
                exploitability -= TENANT_PENALTY;
            }
        }
        exploitability = exploitability.max(EXPLOITABILITY_FLOOR);

        let first = nodes.first().map(|n| n.name.as_str()).unwrap_or("?");
        let last = nodes.last().map(|n| n.name.as_str()).unwrap_or("?");
        let description = format!(
            "{} → {} ({} hops)",
            first,
            last,
            self.node_path.len() - 1,
        );

        self.emitted.push(CriticalPath {
            id: stable_id("path", &self.node_path.join(">")),
            nodes: self.node_path.clone(),
            edges: self.edge_path.clone(),
            risk_score,
            exploitability,
            impact,
            description,
        });
    }
}
