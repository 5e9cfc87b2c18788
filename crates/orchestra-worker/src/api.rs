//! HTTP surface of the worker.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/tasks` | Queue a task event for the runner |
//! | GET | `/tasks` | List all known tasks |
//! | DELETE | `/tasks/{taskID}` | Queue a stop for a task |
//! | GET | `/stats` | Resource snapshot of this node |

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tracing::info;
use uuid::Uuid;

use orchestra_api::ResponseError;
use orchestra_store::StoreError;
use orchestra_task::{State as TaskState, TaskEvent};

use crate::worker::Worker;

/// Build the worker's router.
pub fn router(worker: Arc<Worker>) -> Router {
    Router::new()
        .route("/tasks", post(start_task).get(get_tasks))
        .route("/tasks/{taskID}", delete(stop_task))
        .route("/stats", get(get_stats))
        .with_state(worker)
}

/// POST /tasks — decode an event (unknown fields rejected) and queue the
/// embedded task.
pub async fn start_task(
    State(worker): State<Arc<Worker>>,
    payload: Result<Json<TaskEvent>, JsonRejection>,
) -> impl IntoResponse {
    let Json(event) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return ResponseError::bad_request("error decoding task event", rejection.body_text())
                .into_response();
        }
    };

    let task = event.task.clone();
    worker.add_task(task.clone());
    info!(task_id = %task.id, event_id = %event.id, "task queued");
    (StatusCode::OK, Json(task)).into_response()
}

/// GET /tasks
pub async fn get_tasks(State(worker): State<Arc<Worker>>) -> impl IntoResponse {
    match worker.get_tasks() {
        Ok(tasks) => (StatusCode::OK, Json(tasks)).into_response(),
        Err(e) => ResponseError::internal("error listing tasks", e).into_response(),
    }
}

/// DELETE /tasks/{taskID} — queue a stop by re-enqueueing the stored task
/// with its state set to `Completed`.
pub async fn stop_task(
    State(worker): State<Arc<Worker>>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    let id = match task_id.parse::<Uuid>() {
        Ok(id) => id,
        Err(e) => {
            return ResponseError::bad_request("invalid task id", e).into_response();
        }
    };

    let task = match worker.get_task(&id.to_string()) {
        Ok(task) => task,
        Err(StoreError::NotFound(_)) => {
            return ResponseError::not_found(format!("task {id} not found")).into_response();
        }
        Err(e) => {
            return ResponseError::internal("error loading task", e).into_response();
        }
    };

    let mut stopping = task;
    stopping.state = TaskState::Completed;
    worker.add_task(stopping);
    info!(task_id = %id, "stop queued");
    StatusCode::NO_CONTENT.into_response()
}

/// GET /stats
pub async fn get_stats(State(worker): State<Arc<Worker>>) -> impl IntoResponse {
    Json(worker.stats())
}
