//! Node/edge construction from artifacts, the dependency graph, and
//! detector findings.
//!
//! Extraction is per-file and order-preserving: each artifact yields a
//! local batch of nodes and edges on the rayon pool, and batches are
//! merged single-threaded so that id-collision checks see a consistent
//! graph. All ids are stable hashes; rebuilding from identical inputs
//! yields an isomorphic graph.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use tracing::debug;

use crate::artifact::{CodeArtifact, DependencyGraph};
use crate::detectors::context::{
    window_after, window_before, window_has, AUTH_MARKER_RE, QUERY_RE, ROUTE_RE, SECURITY_FN_RE,
    TENANT_MARKER_RE, WINDOW_AFTER, WINDOW_BEFORE,
};
use crate::detectors::{DetectorType, Finding};
use crate::error::Result;
use crate::graph::{
    stable_id, EdgeType, ExposureLevel, NodeType, ThreatEdge, ThreatGraph, ThreatNode,
    Vulnerability,
};

/// Files whose paths mark them as request-handling surfaces.
static HANDLER_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(controller|resolver|gateway|routes?|handler)").unwrap());

/// Files that sit on a trust boundary.
static BOUNDARY_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(controller|middleware|guard)").unwrap());

/// External imports that represent an external service client.
static SERVICE_IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(axios|node-fetch|https?$|aws|s3|stripe|twilio|sendgrid|redis|kafka|amqp|grpc|nodemailer|smtp|openai|elasticsearch)")
        .unwrap()
});

/// Function names that authenticate a caller rather than validate input.
static AUTH_FN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(auth|guard|verify|token|session|permission|role|login)").unwrap()
});

/// Risk multiplier for imports that leave the scanned tree.
const EXTERNAL_IMPORT_MULTIPLIER: f64 = 1.5;

/// Risk multiplier for escalation edges; a caller-steered lookup carries
/// more risk into the data access than plain data flow.
const ESCALATION_MULTIPLIER: f64 = 1.5;

/// Initial risk seeds per node kind; propagation refines them.
const RISK_FILE: f64 = 2.0;
const RISK_FUNCTION: f64 = 4.0;
const RISK_ENDPOINT_PUBLIC: f64 = 7.0;
const RISK_ENDPOINT_AUTHED: f64 = 5.0;
const RISK_QUERY_SCOPED: f64 = 6.0;
const RISK_QUERY_UNSCOPED: f64 = 8.0;
const RISK_EXTERNAL_SERVICE: f64 = 5.0;
const RISK_SECRET: f64 = 9.0;
const RISK_BOUNDARY: f64 = 6.0;

/// Build the initial threat graph: nodes and edges populated, risk
/// seeded, paths and aggregate score left for the later phases.
pub fn build(
    artifacts: &[CodeArtifact],
    deps: &DependencyGraph,
    findings: &[Finding],
) -> Result<ThreatGraph> {
    let mut graph = ThreatGraph::new();

    // Per-file extraction fans out; merge is single-threaded.
    let batches: Vec<Batch> = artifacts
        .par_iter()
        .filter(|a| a.validate().is_ok())
        .map(extract_artifact)
        .collect();

    for batch in batches {
        for node in batch.nodes {
            graph.add_node(node)?;
        }
        for edge in batch.edges {
            graph.add_edge(edge);
        }
    }

    add_dependency_edges(&mut graph, artifacts, deps);
    add_secret_nodes(&mut graph, artifacts, findings)?;
    add_escalation_edges(&mut graph, artifacts, findings);
    attach_vulnerabilities(&mut graph, artifacts, findings);
    assign_positions(&mut graph);

    debug!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        vulnerabilities = graph.vulnerabilities.len(),
        "threat graph built"
    );
    Ok(graph)
}

/// Local node/edge batch for one artifact.
struct Batch {
    nodes: Vec<ThreatNode>,
    edges: Vec<ThreatEdge>,
}

fn extract_artifact(artifact: &CodeArtifact) -> Batch {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let lines: Vec<&str> = artifact.content.lines().collect();
    let path_lower = artifact.path_lower();

    let file_id = stable_id(NodeType::File.as_str(), &artifact.id);
    let file_name = artifact
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| artifact.id.clone());

    // 1. One file node per artifact.
    let mut file_node = ThreatNode::new(NodeType::File, &file_name, &artifact.id);
    file_node.set_risk(RISK_FILE);
    file_node.metadata.file_path = Some(artifact.path.to_string_lossy().into_owned());
    file_node.metadata.business_criticality = 4.0;
    file_node.metadata.security_patterns =
        artifact.pattern_hits.iter().map(|h| h.pattern.clone()).collect();
    nodes.push(file_node);

    // 2. Function nodes for security-relevant or pre-flagged functions.
    for function in &artifact.functions {
        if !SECURITY_FN_RE.is_match(&function.name) && !function.risk_level.is_notable() {
            continue;
        }
        let identifier = format!("{}#{}", artifact.id, function.name);
        let mut node = ThreatNode::new(NodeType::Function, &function.name, &identifier);
        node.set_risk(RISK_FUNCTION);
        node.metadata.file_path = Some(artifact.path.to_string_lossy().into_owned());
        node.metadata.line_number = Some(function.line);
        node.metadata.business_criticality = 5.0;
        edges.push(ThreatEdge::new(EdgeType::Calls, &file_id, &node.id));
        nodes.push(node);
    }

    // 3. Endpoint nodes from handler-ish files.
    let is_handler_file = HANDLER_PATH_RE.is_match(&path_lower);
    let mut endpoint_ids = Vec::new();
    if is_handler_file {
        for (idx, line) in lines.iter().enumerate() {
            if !ROUTE_RE.is_match(line) {
                continue;
            }
            let has_auth = AUTH_MARKER_RE.is_match(line)
                || window_has(&window_before(&lines, idx, WINDOW_BEFORE), &AUTH_MARKER_RE);
            let tenant_scoped =
                TENANT_MARKER_RE.is_match(line)
                    || window_has(&window_after(&lines, idx, WINDOW_AFTER), &TENANT_MARKER_RE);

            let identifier = format!("{}:{}", artifact.id, idx + 1);
            let mut node = ThreatNode::new(NodeType::Endpoint, line.trim(), &identifier);
            node.metadata.file_path = Some(artifact.path.to_string_lossy().into_owned());
            node.metadata.line_number = Some(idx + 1);
            node.metadata.business_criticality = 7.0;
            node.metadata.tenant_isolation = tenant_scoped;
            if has_auth {
                node.metadata.exposure_level = ExposureLevel::Authenticated;
                node.set_risk(RISK_ENDPOINT_AUTHED);
            } else {
                node.metadata.exposure_level = ExposureLevel::Public;
                node.set_risk(RISK_ENDPOINT_PUBLIC);
            }
            // The handler dispatches into its module's code.
            edges.push(ThreatEdge::new(EdgeType::Calls, &node.id, &file_id));
            endpoint_ids.push(node.id.clone());
            nodes.push(node);
        }
    }

    // 4. Data-access nodes per query operation.
    let mut query_ids = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if !QUERY_RE.is_match(line) {
            continue;
        }
        let tenant_scoped = TENANT_MARKER_RE.is_match(line)
            || window_has(&window_after(&lines, idx, WINDOW_AFTER), &TENANT_MARKER_RE);

        let identifier = format!("{}:{}", artifact.id, idx + 1);
        let mut node = ThreatNode::new(NodeType::DatabaseQuery, line.trim(), &identifier);
        node.metadata.file_path = Some(artifact.path.to_string_lossy().into_owned());
        node.metadata.line_number = Some(idx + 1);
        node.metadata.business_criticality = 8.0;
        node.metadata.tenant_isolation = tenant_scoped;
        node.metadata.exposure_level = ExposureLevel::Internal;
        node.set_risk(if tenant_scoped {
            RISK_QUERY_SCOPED
        } else {
            RISK_QUERY_UNSCOPED
        });
        // Module code flows data into its own queries.
        edges.push(ThreatEdge::new(EdgeType::DataFlowsTo, &file_id, &node.id));
        query_ids.push(node.id.clone());
        nodes.push(node);
    }

    // Endpoints flow request data to the queries in the same file.
    for endpoint_id in &endpoint_ids {
        for query_id in &query_ids {
            edges.push(ThreatEdge::new(EdgeType::DataFlowsTo, endpoint_id, query_id));
        }
        // Endpoints authenticate with the auth-shaped functions in the
        // same file and validate with the rest.
        for node in &nodes {
            if node.node_type == NodeType::Function {
                let edge_type = if AUTH_FN_RE.is_match(&node.name) {
                    EdgeType::AuthenticatesWith
                } else {
                    EdgeType::ValidatesWith
                };
                edges.push(ThreatEdge::new(edge_type, endpoint_id, &node.id));
            }
        }
    }

    // 5a. Trust boundary node per boundary-ish file.
    if BOUNDARY_PATH_RE.is_match(&path_lower) {
        let mut node = ThreatNode::new(
            NodeType::TrustBoundary,
            format!("boundary:{}", file_name),
            &artifact.id,
        );
        node.set_risk(RISK_BOUNDARY);
        node.metadata.file_path = Some(artifact.path.to_string_lossy().into_owned());
        node.metadata.business_criticality = 7.0;
        node.metadata.exposure_level = ExposureLevel::Public;
        for endpoint_id in &endpoint_ids {
            edges.push(ThreatEdge::new(EdgeType::ExposesTo, &node.id, endpoint_id));
        }
        nodes.push(node);
    }

    // 5b. External service nodes from service-client imports.
    for import in &artifact.imports {
        if import.starts_with('.') || !SERVICE_IMPORT_RE.is_match(import) {
            continue;
        }
        let mut node = ThreatNode::new(NodeType::ExternalService, import.as_str(), import);
        node.set_risk(RISK_EXTERNAL_SERVICE);
        node.metadata.business_criticality = 6.0;
        node.metadata.exposure_level = ExposureLevel::Internal;
        edges.push(
            ThreatEdge::new(EdgeType::DependsOn, &file_id, &node.id)
                .with_multiplier(EXTERNAL_IMPORT_MULTIPLIER),
        );
        nodes.push(node);
    }

    Batch { nodes, edges }
}

/// Dependency edges from the supplied import adjacency.
fn add_dependency_edges(
    graph: &mut ThreatGraph,
    artifacts: &[CodeArtifact],
    deps: &DependencyGraph,
) {
    for artifact in artifacts {
        let source_id = stable_id(NodeType::File.as_str(), &artifact.id);
        if !graph.contains_node(&source_id) {
            continue;
        }
        for target in deps.targets_of(&artifact.id) {
            let multiplier = if target.external {
                EXTERNAL_IMPORT_MULTIPLIER
            } else {
                1.0
            };
            let target_id = stable_id(NodeType::File.as_str(), &target.target);
            if !graph.contains_node(&target_id) {
                continue;
            }
            graph.add_edge(
                ThreatEdge::new(EdgeType::DependsOn, &source_id, &target_id)
                    .with_multiplier(multiplier),
            );
        }
    }
}

/// One secret node per credential-exposure finding, exposed by its file.
fn add_secret_nodes(
    graph: &mut ThreatGraph,
    artifacts: &[CodeArtifact],
    findings: &[Finding],
) -> Result<()> {
    let by_path = path_to_artifact_id(artifacts);

    for finding in findings {
        if finding.detector_type != DetectorType::HardcodedCredentials {
            continue;
        }
        let Some(location) = finding.location() else {
            continue;
        };
        let identifier = format!("{}:{}", location.file.display(), location.line);
        let mut node = ThreatNode::new(NodeType::Secret, &finding.title, &identifier);
        node.set_risk(RISK_SECRET);
        node.metadata.file_path = Some(location.file.to_string_lossy().into_owned());
        node.metadata.line_number = Some(location.line);
        node.metadata.business_criticality = 9.0;
        node.metadata.exposure_level = ExposureLevel::Private;
        let secret_id = node.id.clone();
        graph.add_node(node)?;

        let path_key = location.file.to_string_lossy().into_owned();
        if let Some(artifact_id) = by_path.get(&path_key) {
            let file_id = stable_id(NodeType::File.as_str(), artifact_id);
            if graph.contains_node(&file_id) {
                graph.add_edge(ThreatEdge::new(EdgeType::ExposesTo, &file_id, &secret_id));
            }
        }
    }
    Ok(())
}

/// Escalation edges per privilege-escalation finding: a caller-steered
/// identifier in this file escalates into the file's data accesses.
fn add_escalation_edges(
    graph: &mut ThreatGraph,
    artifacts: &[CodeArtifact],
    findings: &[Finding],
) {
    let by_path = path_to_artifact_id(artifacts);

    for finding in findings {
        if finding.detector_type != DetectorType::PrivilegeEscalation {
            continue;
        }
        let Some(location) = finding.location() else {
            continue;
        };
        let path_key = location.file.to_string_lossy().into_owned();
        let Some(artifact_id) = by_path.get(&path_key) else {
            continue;
        };
        let file_id = stable_id(NodeType::File.as_str(), artifact_id);
        if !graph.contains_node(&file_id) {
            continue;
        }

        let query_ids: Vec<String> = graph
            .nodes
            .iter()
            .filter(|n| {
                n.node_type == NodeType::DatabaseQuery
                    && n.metadata.file_path.as_deref() == Some(path_key.as_str())
            })
            .map(|n| n.id.clone())
            .collect();
        for query_id in query_ids {
            graph.add_edge(
                ThreatEdge::new(EdgeType::EscalatesTo, &file_id, &query_id)
                    .with_multiplier(ESCALATION_MULTIPLIER),
            );
        }
    }
}

/// Project every finding onto its graph node.
fn attach_vulnerabilities(
    graph: &mut ThreatGraph,
    artifacts: &[CodeArtifact],
    findings: &[Finding],
) {
    let by_path = path_to_artifact_id(artifacts);

    for finding in findings {
        let Some(location) = finding.location() else {
            continue;
        };
        // Credential findings attach to their secret node, everything
        // else to the file node of the artifact.
        let node_id = if finding.detector_type == DetectorType::HardcodedCredentials {
            let identifier = format!("{}:{}", location.file.display(), location.line);
            stable_id(NodeType::Secret.as_str(), &identifier)
        } else {
            let path_key = location.file.to_string_lossy().into_owned();
            match by_path.get(&path_key) {
                Some(artifact_id) => stable_id(NodeType::File.as_str(), artifact_id),
                None => continue,
            }
        };
        if !graph.contains_node(&node_id) {
            continue;
        }

        let exploit_scenario = finding
            .exploit_chain
            .as_deref()
            .map(|steps| {
                steps
                    .iter()
                    .map(|s| s.action.as_str())
                    .collect::<Vec<_>>()
                    .join("; then ")
            })
            .unwrap_or_else(|| finding.description.clone());

        graph.vulnerabilities.push(Vulnerability {
            id: finding.id.clone(),
            node_id,
            detector_type: finding.detector_type,
            severity: finding.severity,
            title: finding.title.clone(),
            description: finding.description.clone(),
            exploit_scenario,
            business_impact: finding.business_impact,
        });
    }
}

fn path_to_artifact_id(artifacts: &[CodeArtifact]) -> HashMap<String, String> {
    artifacts
        .iter()
        .map(|a| (a.path.to_string_lossy().into_owned(), a.id.clone()))
        .collect()
}

/// Deterministic grid layout; a rendering hint only.
fn assign_positions(graph: &mut ThreatGraph) {
    for (idx, node) in graph.nodes.iter_mut().enumerate() {
        node.position.x = (idx % 10) as f64 * 180.0;
        node.position.y = (idx / 10) as f64 * 120.0;
    }
}
