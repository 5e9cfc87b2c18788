//! Runtime error types.

use thiserror::Error;

/// Result type alias for container runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors reported by the container engine adapter.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("engine client error: {0}")]
    Client(String),

    #[error("image pull failed: {0}")]
    ImagePull(String),

    #[error("container create failed: {0}")]
    Create(String),

    #[error("container start failed: {0}")]
    Start(String),

    #[error("container stop failed: {0}")]
    Stop(String),

    #[error("container remove failed: {0}")]
    Remove(String),

    #[error("container inspect failed: {0}")]
    Inspect(String),
}
