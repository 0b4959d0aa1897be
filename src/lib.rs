//! threatlens — threat-graph construction and risk-propagation engine.
//!
//! Ingests pre-parsed code artifacts, runs pattern-based vulnerability
//! detectors, builds a weighted directed attack graph, propagates risk
//! to a fixed point, enumerates bounded attack paths from exposed nodes
//! to sensitive ones, and aggregates an overall posture score.
//!
//! # Quick Start
//!
//! ```no_run
//! use threatlens::{analyze, AnalyzeOptions};
//! use threatlens::artifact::{CodeArtifact, DependencyGraph};
//!
//! let artifacts: Vec<CodeArtifact> = load_artifacts();
//! let deps = DependencyGraph::default();
//! let report = analyze(&artifacts, &deps, &AnalyzeOptions::default()).unwrap();
//! println!("posture: {:.1}, findings: {}", report.graph.risk_score, report.findings.len());
//! # fn load_artifacts() -> Vec<threatlens::artifact::CodeArtifact> { vec![] }
//! ```

pub mod artifact;
pub mod config;
pub mod detectors;
pub mod error;
pub mod graph;
pub mod output;

use serde::{Deserialize, Serialize};
use tracing::info;

use artifact::{CodeArtifact, DependencyGraph};
use config::Config;
use detectors::{DetectorSet, Finding};
use error::{Result, ThreatError};
use graph::ThreatGraph;
use output::OutputFormat;

/// Options for an analysis invocation.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Path to config file (defaults to `.threatlens.toml` in the cwd).
    pub config_path: Option<std::path::PathBuf>,
    /// Target name carried into the report.
    pub target_name: String,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            target_name: "unknown".into(),
        }
    }
}

/// Complete analysis output: standalone findings plus the threat graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub target_name: String,
    pub findings: Vec<Finding>,
    pub graph: ThreatGraph,
}

/// Run every registered detector over all artifacts.
///
/// Detector fan-out runs on a pool bounded by `engine.parallelism`
/// (0 = rayon default). Per-artifact failures are contained and logged.
pub fn run_detectors(artifacts: &[CodeArtifact], config: &Config) -> Result<Vec<Finding>> {
    let detector_set = DetectorSet::with_disabled(&config.detectors.disabled);
    with_pool(config.engine.parallelism, || {
        Ok(detector_set.run_all(artifacts))
    })
}

/// Build the complete threat graph: detectors → nodes/edges → trust
/// boundary seeding → risk propagation → critical paths → posture.
///
/// Phases are strictly ordered; each consumes the full output of the
/// previous one. A failure in any graph phase is fatal to the run.
pub fn build_threat_graph(
    artifacts: &[CodeArtifact],
    deps: &DependencyGraph,
    config: &Config,
) -> Result<ThreatGraph> {
    let findings = run_detectors(artifacts, config)?;
    build_graph_from_findings(artifacts, deps, &findings, config)
}

/// Graph phases only, for callers that already hold findings.
pub fn build_graph_from_findings(
    artifacts: &[CodeArtifact],
    deps: &DependencyGraph,
    findings: &[Finding],
    config: &Config,
) -> Result<ThreatGraph> {
    let engine = &config.engine;
    with_pool(engine.parallelism, || {
        let mut threat_graph = graph::builder::build(artifacts, deps, findings)?;
        graph::boundary::analyze(&mut threat_graph, engine);
        let rounds = graph::propagation::propagate(&mut threat_graph, engine);
        threat_graph.critical_paths = graph::paths::find_critical_paths(&threat_graph, engine);
        threat_graph.risk_score =
            graph::posture::overall_risk(&threat_graph, &threat_graph.critical_paths);

        info!(
            nodes = threat_graph.nodes.len(),
            edges = threat_graph.edges.len(),
            rounds,
            paths = threat_graph.critical_paths.len(),
            risk = threat_graph.risk_score,
            "analysis complete"
        );
        Ok(threat_graph)
    })
}

/// Run a complete analysis: detectors, then the graph pipeline.
///
/// Findings computed before a fatal graph-phase error are preserved in
/// the error path via [`run_detectors`]; `analyze` itself is
/// all-or-nothing.
pub fn analyze(
    artifacts: &[CodeArtifact],
    deps: &DependencyGraph,
    options: &AnalyzeOptions,
) -> Result<AnalysisReport> {
    let config_path = options
        .config_path
        .clone()
        .unwrap_or_else(|| std::path::PathBuf::from(".threatlens.toml"));
    let config = Config::load(&config_path)?;

    let findings = run_detectors(artifacts, &config)?;
    let threat_graph = build_graph_from_findings(artifacts, deps, &findings, &config)?;

    Ok(AnalysisReport {
        target_name: options.target_name.clone(),
        findings,
        graph: threat_graph,
    })
}

/// Render an analysis report in the specified format.
pub fn render_report(report: &AnalysisReport, format: OutputFormat) -> Result<String> {
    output::render(report, format)
}

/// Run `f` on a dedicated pool of `threads` workers, or inline on the
/// global pool when `threads` is 0.
fn with_pool<T>(threads: usize, f: impl FnOnce() -> Result<T> + Send) -> Result<T>
where
    T: Send,
{
    if threads == 0 {
        return f();
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| ThreatError::Config(format!("failed to build worker pool: {}", e)))?;
    pool.install(f)
}
