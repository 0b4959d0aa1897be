//! The threat graph: a directed multigraph of attack-surface entities.
//!
//! Node and edge ids are pure hashes of `(type, stable identifier)`, so
//! two builds over identical inputs produce an isomorphic graph. Cycles
//! are permitted; every traversal in this module tree is cycle-safe.

pub mod boundary;
pub mod builder;
pub mod paths;
pub mod posture;
pub mod propagation;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::detectors::{BusinessImpact, DetectorType, Severity};
use crate::error::{Result, ThreatError};

/// Deterministic id: first 16 hex chars of SHA-256 over `type:identifier`.
/// Determinism and low collision probability are the requirement, not
/// cryptographic strength.
pub fn stable_id(kind: &str, identifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(b":");
    hasher.update(identifier.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    File,
    Function,
    Endpoint,
    DatabaseQuery,
    ExternalService,
    Secret,
    TrustBoundary,
    Container,
    Role,
    Policy,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Function => "function",
            Self::Endpoint => "endpoint",
            Self::DatabaseQuery => "database_query",
            Self::ExternalService => "external_service",
            Self::Secret => "secret",
            Self::TrustBoundary => "trust_boundary",
            Self::Container => "container",
            Self::Role => "role",
            Self::Policy => "policy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Calls,
    DependsOn,
    DataFlowsTo,
    AuthenticatesWith,
    EscalatesTo,
    ExposesTo,
    ValidatesWith,
    CachesIn,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calls => "calls",
            Self::DependsOn => "depends_on",
            Self::DataFlowsTo => "data_flows_to",
            Self::AuthenticatesWith => "authenticates_with",
            Self::EscalatesTo => "escalates_to",
            Self::ExposesTo => "exposes_to",
            Self::ValidatesWith => "validates_with",
            Self::CachesIn => "caches_in",
        }
    }
}

/// Who can reach a node without further privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposureLevel {
    Public,
    Authenticated,
    Privileged,
    Internal,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
    #[serde(default)]
    pub security_patterns: Vec<String>,
    /// [0,10], how much the business cares if this node is compromised.
    pub business_criticality: f64,
    pub exposure_level: ExposureLevel,
    pub tenant_isolation: bool,
}

impl Default for NodeMetadata {
    fn default() -> Self {
        Self {
            file_path: None,
            line_number: None,
            security_patterns: Vec::new(),
            business_criticality: 5.0,
            exposure_level: ExposureLevel::Internal,
            tenant_isolation: true,
        }
    }
}

/// Layout hint for rendering; carries no analysis semantics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    /// [0,10], clamped at every write.
    pub risk_score: f64,
    pub metadata: NodeMetadata,
    pub position: Position,
}

impl ThreatNode {
    pub fn new(node_type: NodeType, name: impl Into<String>, identifier: &str) -> Self {
        Self {
            id: stable_id(node_type.as_str(), identifier),
            node_type,
            name: name.into(),
            risk_score: 0.0,
            metadata: NodeMetadata::default(),
            position: Position::default(),
        }
    }

    /// Set risk, clamped to [0,10].
    pub fn set_risk(&mut self, risk: f64) {
        self.risk_score = risk.clamp(0.0, 10.0);
    }

    /// Add to risk, clamped to [0,10].
    pub fn bump_risk(&mut self, delta: f64) {
        self.set_risk(self.risk_score + delta);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    pub validation_level: ValidationLevel,
    pub encryption_level: EncryptionLevel,
    pub audit_trail: bool,
}

impl Default for EdgeMetadata {
    fn default() -> Self {
        Self {
            data_type: None,
            validation_level: ValidationLevel::None,
            encryption_level: EncryptionLevel::None,
            audit_trail: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    None,
    Partial,
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionLevel {
    None,
    Transport,
    EndToEnd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub weight: f64,
    pub risk_multiplier: f64,
    pub metadata: EdgeMetadata,
}

impl ThreatEdge {
    pub fn new(edge_type: EdgeType, source: &str, target: &str) -> Self {
        let identifier = format!("{}->{}", source, target);
        Self {
            id: stable_id(edge_type.as_str(), &identifier),
            source: source.into(),
            target: target.into(),
            edge_type,
            weight: 1.0,
            risk_multiplier: 1.0,
            metadata: EdgeMetadata::default(),
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.risk_multiplier = multiplier;
        self
    }
}

/// A bounded, scored route from an exposed node to a sensitive one.
/// Derived data: recomputed on every build, never persisted as truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalPath {
    pub id: String,
    pub nodes: Vec<String>,
    pub edges: Vec<String>,
    pub risk_score: f64,
    pub exploitability: f64,
    pub impact: f64,
    pub description: String,
}

/// A finding projected onto a specific graph node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vulnerability {
    pub id: String,
    pub node_id: String,
    pub detector_type: DetectorType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub exploit_scenario: String,
    pub business_impact: BusinessImpact,
}

/// The complete analysis output: graph, aggregate score, derived paths,
/// and node-attached vulnerabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "GraphWire")]
pub struct ThreatGraph {
    pub nodes: Vec<ThreatNode>,
    pub edges: Vec<ThreatEdge>,
    /// Overall posture score, [0,10].
    pub risk_score: f64,
    pub critical_paths: Vec<CriticalPath>,
    pub vulnerabilities: Vec<Vulnerability>,
    /// id → index into `nodes`, for O(1) lookups during analysis.
    #[serde(skip)]
    node_index: HashMap<String, usize>,
    /// Edge ids already inserted, for O(1) duplicate collapse.
    #[serde(skip)]
    edge_ids: HashSet<String>,
}

/// Serialized shape of [`ThreatGraph`]. Converting back rebuilds the
/// indexes that `#[serde(skip)]` leaves empty.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphWire {
    nodes: Vec<ThreatNode>,
    edges: Vec<ThreatEdge>,
    risk_score: f64,
    critical_paths: Vec<CriticalPath>,
    vulnerabilities: Vec<Vulnerability>,
}

impl From<GraphWire> for ThreatGraph {
    fn from(wire: GraphWire) -> Self {
        let mut graph = Self {
            nodes: wire.nodes,
            edges: wire.edges,
            risk_score: wire.risk_score,
            critical_paths: wire.critical_paths,
            vulnerabilities: wire.vulnerabilities,
            node_index: HashMap::new(),
            edge_ids: HashSet::new(),
        };
        graph.reindex();
        graph
    }
}

impl ThreatGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. Re-inserting the identical (type, name) pair is a
    /// no-op; a colliding id with a different identity is fatal.
    pub fn add_node(&mut self, node: ThreatNode) -> Result<()> {
        if let Some(&idx) = self.node_index.get(&node.id) {
            let existing = &self.nodes[idx];
            if existing.node_type != node.node_type || existing.name != node.name {
                return Err(ThreatError::GraphBuild(format!(
                    "id collision: '{}' maps to both {}/{} and {}/{}",
                    node.id,
                    existing.node_type.as_str(),
                    existing.name,
                    node.node_type.as_str(),
                    node.name,
                )));
            }
            return Ok(());
        }
        self.node_index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Insert an edge; duplicate ids (same type/source/target) collapse.
    pub fn add_edge(&mut self, edge: ThreatEdge) {
        if self.edge_ids.insert(edge.id.clone()) {
            self.edges.push(edge);
        }
    }

    pub fn node(&self, id: &str) -> Option<&ThreatNode> {
        self.node_index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut ThreatNode> {
        let idx = *self.node_index.get(id)?;
        Some(&mut self.nodes[idx])
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    /// Outgoing adjacency as id pairs: node id → (edge idx, target id).
    pub fn outgoing(&self) -> HashMap<&str, Vec<(usize, &str)>> {
        let mut adjacency: HashMap<&str, Vec<(usize, &str)>> = HashMap::new();
        for (idx, edge) in self.edges.iter().enumerate() {
            adjacency
                .entry(edge.source.as_str())
                .or_default()
                .push((idx, edge.target.as_str()));
        }
        adjacency
    }

    /// Rebuild the id indexes from the node and edge lists.
    pub fn reindex(&mut self) {
        self.node_index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, n)| (n.id.clone(), idx))
            .collect();
        self.edge_ids = self.edges.iter().map(|e| e.id.clone()).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_id_is_deterministic() {
        assert_eq!(stable_id("file", "src/a.ts"), stable_id("file", "src/a.ts"));
        assert_ne!(stable_id("file", "src/a.ts"), stable_id("file", "src/b.ts"));
        assert_ne!(
            stable_id("file", "src/a.ts"),
            stable_id("endpoint", "src/a.ts")
        );
        assert_eq!(stable_id("file", "src/a.ts").len(), 16);
    }

    #[test]
    fn duplicate_identical_node_is_idempotent() {
        let mut graph = ThreatGraph::new();
        graph
            .add_node(ThreatNode::new(NodeType::File, "a.ts", "a.ts"))
            .unwrap();
        graph
            .add_node(ThreatNode::new(NodeType::File, "a.ts", "a.ts"))
            .unwrap();
        assert_eq!(graph.nodes.len(), 1);
    }

    #[test]
    fn conflicting_id_is_fatal() {
        let mut graph = ThreatGraph::new();
        graph
            .add_node(ThreatNode::new(NodeType::File, "a.ts", "a.ts"))
            .unwrap();
        let clash = ThreatNode::new(NodeType::File, "other-name", "a.ts");
        let err = graph.add_node(clash).unwrap_err();
        assert!(matches!(err, ThreatError::GraphBuild(_)));
    }

    #[test]
    fn risk_writes_are_clamped() {
        let mut node = ThreatNode::new(NodeType::Endpoint, "GET /x", "GET /x");
        node.set_risk(42.0);
        assert_eq!(node.risk_score, 10.0);
        node.set_risk(-1.0);
        assert_eq!(node.risk_score, 0.0);
        node.bump_risk(25.0);
        assert_eq!(node.risk_score, 10.0);
    }

    #[test]
    fn duplicate_edges_collapse_but_multigraph_allowed() {
        let mut graph = ThreatGraph::new();
        graph.add_edge(ThreatEdge::new(EdgeType::Calls, "a", "b"));
        graph.add_edge(ThreatEdge::new(EdgeType::Calls, "a", "b"));
        // Different edge type between the same pair is a distinct arc.
        graph.add_edge(ThreatEdge::new(EdgeType::DataFlowsTo, "a", "b"));
        assert_eq!(graph.edges.len(), 2);
    }

    #[test]
    fn deserialized_graph_rebuilds_indexes() {
        let mut graph = ThreatGraph::new();
        let node = ThreatNode::new(NodeType::File, "a.ts", "a.ts");
        let node_id = node.id.clone();
        graph.add_node(node).unwrap();
        graph.add_edge(ThreatEdge::new(EdgeType::Calls, "a", "b"));

        let json = serde_json::to_string(&graph).unwrap();
        let mut restored: ThreatGraph = serde_json::from_str(&json).unwrap();
        assert!(restored.contains_node(&node_id));
        assert!(restored.node(&node_id).is_some());
        // Duplicate collapse survives the round trip.
        restored.add_edge(ThreatEdge::new(EdgeType::Calls, "a", "b"));
        assert_eq!(restored.edges.len(), 1);
    }

    #[test]
    fn serialized_graph_uses_contract_field_names() {
        let mut graph = ThreatGraph::new();
        graph
            .add_node(ThreatNode::new(NodeType::DatabaseQuery, "q", "q"))
            .unwrap();
        let json = serde_json::to_value(&graph).unwrap();
        assert!(json.get("criticalPaths").is_some());
        assert!(json.get("riskScore").is_some());
        assert_eq!(json["nodes"][0]["type"], "database_query");
        assert!(json["nodes"][0].get("riskScore").is_some());
        assert!(json["nodes"][0]["metadata"].get("exposureLevel").is_some());
    }
}
