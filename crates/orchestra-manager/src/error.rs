//! Manager error types.

use thiserror::Error;
use uuid::Uuid;

use orchestra_api::ResponseError;
use orchestra_store::StoreError;
use orchestra_task::State;

/// Result type alias for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors that can occur while placing and reconciling tasks.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("no pending tasks")]
    NoPendingTasks,

    #[error("no candidates found for task {0}")]
    NoCandidates(Uuid),

    /// An event targeted an already-placed task with anything other than
    /// a legal move to `Completed`.
    #[error("invalid mutation: task {id} in state {state} cannot be moved to {requested}")]
    InvalidMutation {
        id: Uuid,
        state: State,
        requested: State,
    },

    #[error("task {0} has no placement")]
    NotPlaced(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The outbound HTTP call itself failed; the dispatcher re-enqueues
    /// the event when this comes out of a hand-off.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The worker answered with an error envelope.
    #[error("worker {worker} refused: {error}")]
    Remote { worker: String, error: ResponseError },

    #[error("failed to decode response from worker {worker}: {details}")]
    Decode { worker: String, details: String },
}
