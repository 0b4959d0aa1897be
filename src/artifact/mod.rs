//! Input model for the analysis engine.
//!
//! Artifacts arrive pre-parsed from an upstream extraction stage: raw
//! text plus structural facts (functions, imports, per-line pattern
//! hits). Everything here is immutable once constructed — detectors and
//! the graph builder only read it.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ThreatError};

/// A single source artifact with pre-extracted structural facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeArtifact {
    /// Stable identity (usually the repo-relative path).
    pub id: String,
    pub path: PathBuf,
    /// Raw file text.
    pub content: String,
    /// Functions extracted by the upstream parser.
    #[serde(default)]
    pub functions: Vec<FunctionInfo>,
    /// Import specifiers extracted by the upstream parser.
    #[serde(default)]
    pub imports: Vec<String>,
    /// Per-line heuristic pattern hits tagged upstream.
    #[serde(default)]
    pub pattern_hits: Vec<PatternHit>,
}

impl CodeArtifact {
    /// Reject artifacts missing required identity fields.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(ThreatError::MalformedArtifact {
                id: "<empty>".into(),
                message: "artifact id is empty".into(),
            });
        }
        if self.path.as_os_str().is_empty() {
            return Err(ThreatError::MalformedArtifact {
                id: self.id.clone(),
                message: "artifact path is empty".into(),
            });
        }
        Ok(())
    }

    /// Lowercased path string, used by the builder's path heuristics.
    pub fn path_lower(&self) -> String {
        self.path.to_string_lossy().to_lowercase()
    }
}

/// A function extracted from an artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInfo {
    pub name: String,
    /// 1-based line of the declaration.
    pub line: usize,
    #[serde(default)]
    pub risk_level: RiskLevel,
}

/// Coarse risk classification assigned upstream per function.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Non-trivial risk warrants its own graph node.
    pub fn is_notable(&self) -> bool {
        *self >= Self::Medium
    }
}

/// A pre-tagged heuristic hit on a single line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternHit {
    /// 1-based line number.
    pub line: usize,
    /// Pattern label, e.g. "sql_query", "crypto", "deserialization".
    pub pattern: String,
}

/// Location in source code, attached to evidence and vulnerabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub file: PathBuf,
    /// 1-based line number.
    pub line: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// Import adjacency produced by the (out-of-scope) dependency pass:
/// artifact id → import targets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraph {
    #[serde(default)]
    pub edges: HashMap<String, Vec<ImportTarget>>,
}

impl DependencyGraph {
    pub fn targets_of(&self, artifact_id: &str) -> &[ImportTarget] {
        self.edges.get(artifact_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// One resolved import edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTarget {
    /// Target artifact id for internal imports, bare specifier otherwise.
    pub target: String,
    /// True for package imports that leave the scanned tree.
    #[serde(default)]
    pub external: bool,
}
