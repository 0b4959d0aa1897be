use thiserror::Error;

pub type Result<T> = std::result::Result<T, ThreatError>;

#[derive(Error, Debug)]
pub enum ThreatError {
    /// An artifact could not be scanned. Non-fatal: log and skip.
    #[error("Artifact unreadable ({path}): {message}")]
    ArtifactUnreadable { path: String, message: String },

    /// An artifact is missing required fields. Non-fatal: reject the
    /// single artifact, continue with the rest.
    #[error("Malformed artifact '{id}': {message}")]
    MalformedArtifact { id: String, message: String },

    /// Graph invariant violation (e.g. id collision). Fatal: downstream
    /// phases assume a consistent graph.
    #[error("Graph build failure: {0}")]
    GraphBuild(String),

    /// A whole analysis phase failed. Fatal: phases are sequentially
    /// dependent, there is no partial-graph contract.
    #[error("Phase '{phase}' failed: {message}")]
    Phase { phase: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ThreatError {
    /// Whether the error aborts the whole run or only the current artifact.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::ArtifactUnreadable { .. } | Self::MalformedArtifact { .. }
        )
    }

    pub fn exit_code(&self) -> i32 {
        2
    }
}
