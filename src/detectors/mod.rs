//! Detector set: pluggable pattern-based vulnerability scanners.
//!
//! Each detector is a pure function from one artifact to zero or more
//! findings. Detectors never mutate artifacts and never talk to each
//! other; overlapping findings from different detectors are kept as-is
//! (no cross-detector deduplication).

pub mod builtin;
pub mod context;
pub mod finding;

use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;
use tracing::warn;

use crate::artifact::CodeArtifact;

pub use finding::{
    BusinessImpact, DetectorMetadata, DetectorType, Evidence, ExploitStep, Finding, Severity,
};

/// A detector checks one artifact and produces findings.
pub trait Detector: Send + Sync {
    /// Metadata about this detector (id, name, family, severity).
    fn metadata(&self) -> DetectorMetadata;

    /// Run the detector against a single artifact.
    fn detect(&self, artifact: &CodeArtifact) -> Vec<Finding>;
}

/// The active set of detectors, run across artifacts on a bounded pool.
pub struct DetectorSet {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorSet {
    /// All built-in detectors.
    pub fn new() -> Self {
        Self {
            detectors: builtin::all_detectors(),
        }
    }

    /// Built-in detectors minus the ids listed in `disabled`.
    pub fn with_disabled(disabled: &[String]) -> Self {
        let detectors = builtin::all_detectors()
            .into_iter()
            .filter(|d| !disabled.iter().any(|id| *id == d.metadata().id))
            .collect();
        Self { detectors }
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// List metadata for all registered detectors.
    pub fn list(&self) -> Vec<DetectorMetadata> {
        self.detectors.iter().map(|d| d.metadata()).collect()
    }

    /// Run every detector against every artifact.
    ///
    /// Artifacts fan out across the current rayon pool. Per-artifact
    /// failures are contained: invalid artifacts are skipped with a
    /// warning, and a panicking detector loses only that one
    /// (artifact, detector) cell. Results keep artifact order, then
    /// registration order within an artifact.
    pub fn run_all(&self, artifacts: &[CodeArtifact]) -> Vec<Finding> {
        artifacts
            .par_iter()
            .map(|artifact| self.run_one(artifact))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }

    fn run_one(&self, artifact: &CodeArtifact) -> Vec<Finding> {
        if let Err(e) = artifact.validate() {
            warn!(artifact = %artifact.id, error = %e, "skipping malformed artifact");
            return Vec::new();
        }

        let mut findings = Vec::new();
        for detector in &self.detectors {
            let id = detector.metadata().id;
            match catch_unwind(AssertUnwindSafe(|| detector.detect(artifact))) {
                Ok(mut batch) => findings.append(&mut batch),
                Err(_) => {
                    warn!(
                        detector = %id,
                        artifact = %artifact.id,
                        "detector panicked; continuing with remaining detectors"
                    );
                }
            }
        }
        findings
    }
}

impl Default for DetectorSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn artifact(id: &str, content: &str) -> CodeArtifact {
        CodeArtifact {
            id: id.into(),
            path: PathBuf::from(id),
            content: content.into(),
            functions: vec![],
            imports: vec![],
            pattern_hits: vec![],
        }
    }

    #[test]
    fn registry_holds_all_families() {
        let set = DetectorSet::new();
        assert_eq!(set.len(), 7);
        let ids: Vec<String> = set.list().into_iter().map(|m| m.id).collect();
        assert!(ids.contains(&"TL-001".to_string()));
        assert!(ids.contains(&"TL-007".to_string()));
    }

    #[test]
    fn disabling_removes_detector() {
        let set = DetectorSet::with_disabled(&["TL-001".to_string()]);
        assert_eq!(set.len(), 6);
        assert!(set.list().iter().all(|m| m.id != "TL-001"));
    }

    #[test]
    fn malformed_artifact_is_skipped_not_fatal() {
        let set = DetectorSet::new();
        let bad = CodeArtifact {
            id: String::new(),
            path: PathBuf::new(),
            content: r#"const secret = "sk_live_4eC39HqLyjWDar";"#.into(),
            functions: vec![],
            imports: vec![],
            pattern_hits: vec![],
        };
        let good = artifact("a.ts", r#"const apiKey = "sk_live_4eC39HqLyjWDar";"#);
        let findings = set.run_all(&[bad, good]);
        // Only the valid artifact contributes.
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].detector_type, DetectorType::HardcodedCredentials);
    }

    #[test]
    fn panicking_detector_does_not_poison_the_run() {
        struct PanickyDetector;
        impl Detector for PanickyDetector {
            fn metadata(&self) -> DetectorMetadata {
                DetectorMetadata {
                    id: "TL-999".into(),
                    name: "Panicky".into(),
                    description: "always panics".into(),
                    detector_type: DetectorType::Injection,
                    default_severity: Severity::Info,
                    cwe_id: None,
                }
            }
            fn detect(&self, _artifact: &CodeArtifact) -> Vec<Finding> {
                panic!("boom");
            }
        }

        let set = DetectorSet {
            detectors: vec![
                Box::new(PanickyDetector),
                Box::new(builtin::HardcodedCredentialsDetector),
            ],
        };
        let findings =
            set.run_all(&[artifact("a.ts", r#"const apiKey = "sk_live_4eC39HqLyjWDar";"#)]);
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn overlapping_findings_are_not_deduplicated() {
        // A request-keyed, unscoped query trips both the privilege and
        // tenant detectors at the same location.
        let set = DetectorSet::new();
        let findings = set.run_all(&[artifact(
            "src/docs/docs.service.ts",
            "const doc = await repo.findById(req.params.id);",
        )]);
        assert!(findings.len() >= 2);
    }
}
