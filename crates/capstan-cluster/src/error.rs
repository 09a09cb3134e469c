//! Error types for control-plane operations.

use thiserror::Error;

/// Result type alias for control-plane operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors that can occur talking to the orchestration platform.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("kubectl binary not found: {0}")]
    BinaryNotFound(String),

    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("failed to parse {what}: {detail}")]
    Parse { what: String, detail: String },
}
