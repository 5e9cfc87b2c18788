//! Worker error types.

use thiserror::Error;
use uuid::Uuid;

use orchestra_runtime::RuntimeError;
use orchestra_store::StoreError;
use orchestra_task::State;

/// Result type alias for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that can occur while running tasks.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The requested state change is not in the transition table.
    #[error("invalid state transition for task {id}: {from} -> {to}")]
    TransitionViolation { id: Uuid, from: State, to: State },

    #[error("task {0} has no container id")]
    MissingContainerId(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}
