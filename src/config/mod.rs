use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level configuration from `.threatlens.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub detectors: DetectorConfig,
}

impl Config {
    /// Load config from a TOML file. Returns default if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Generate a starter config file.
    pub fn starter_toml() -> &'static str {
        r#"# threatlens configuration

[engine]
# Worker threads for detector and build fan-out (0 = rayon default).
parallelism = 0

# Risk propagation: per-edge decay and round cap.
propagation_decay = 0.8
propagation_max_rounds = 10

# Trust boundary seeding: bonus for the boundary node itself and for
# every node reachable from it.
boundary_bonus = 2.0
reachable_bonus = 1.0

# Critical path enumeration.
max_path_hops = 10
max_paths_per_pair = 10
max_total_paths = 50
min_path_risk = 6.0

[detectors]
# Detector ids to disable entirely.
# disabled = ["TL-007"]
"#
    }
}

/// Tunables for the graph engine phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads for parallel fan-out; 0 means the rayon default.
    pub parallelism: usize,
    /// Per-edge decay applied during risk propagation.
    pub propagation_decay: f64,
    /// Hard cap on propagation rounds.
    pub propagation_max_rounds: usize,
    /// Risk bonus applied to trust-boundary nodes themselves.
    pub boundary_bonus: f64,
    /// Risk bonus applied to nodes reachable from a boundary.
    pub reachable_bonus: f64,
    /// Maximum hops in an enumerated attack path.
    pub max_path_hops: usize,
    /// Maximum paths kept per (source, sink) pair.
    pub max_paths_per_pair: usize,
    /// Maximum paths kept globally after ranking.
    pub max_total_paths: usize,
    /// Paths scoring below this are discarded.
    pub min_path_risk: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallelism: 0,
            propagation_decay: 0.8,
            propagation_max_rounds: 10,
            boundary_bonus: 2.0,
            reachable_bonus: 1.0,
            max_path_hops: 10,
            max_paths_per_pair: 10,
            max_total_paths: 50,
            min_path_risk: 6.0,
        }
    }
}

/// Which detectors run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Detector ids to disable entirely.
    pub disabled: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/.threatlens.toml")).unwrap();
        assert_eq!(config.engine.propagation_max_rounds, 10);
        assert_eq!(config.engine.propagation_decay, 0.8);
        assert!(config.detectors.disabled.is_empty());
    }

    #[test]
    fn starter_toml_parses_back() {
        let config: Config = toml::from_str(Config::starter_toml()).unwrap();
        assert_eq!(config.engine.max_total_paths, 50);
        assert_eq!(config.engine.min_path_risk, 6.0);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str("[engine]\npropagation_decay = 0.5\n").unwrap();
        assert_eq!(config.engine.propagation_decay, 0.5);
        assert_eq!(config.engine.max_path_hops, 10);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".threatlens.toml");
        std::fs::write(&path, "[detectors]\ndisabled = [\"TL-002\"]\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.detectors.disabled, vec!["TL-002".to_string()]);
    }
}
