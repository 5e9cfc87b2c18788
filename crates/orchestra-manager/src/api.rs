//! HTTP surface of the manager.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/tasks` | Queue a task event for the dispatcher |
//! | GET | `/tasks` | List all known tasks |
//! | DELETE | `/tasks/{taskID}` | Queue a stop for a task |

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, post};
use axum::{Json, Router};
use tracing::info;
use uuid::Uuid;

use orchestra_api::ResponseError;
use orchestra_store::StoreError;
use orchestra_task::{State as TaskState, TaskEvent};

use crate::manager::Manager;

/// Build the manager's router.
pub fn router(manager: Arc<Manager>) -> Router {
    Router::new()
        .route("/tasks", post(start_task).get(get_tasks))
        .route("/tasks/{taskID}", delete(stop_task))
        .with_state(manager)
}

/// POST /tasks — decode an event and queue it for the dispatcher.
pub async fn start_task(
    State(manager): State<Arc<Manager>>,
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
    manager.add_task(event);
    info!(task_id = %task.id, "task event queued");
    (StatusCode::CREATED, Json(task)).into_response()
}

/// GET /tasks
pub async fn get_tasks(State(manager): State<Arc<Manager>>) -> impl IntoResponse {
    match manager.get_tasks() {
        Ok(tasks) => (StatusCode::OK, Json(tasks)).into_response(),
        Err(e) => ResponseError::internal("error listing tasks", e).into_response(),
    }
}

/// DELETE /tasks/{taskID} — queue a `Completed` event carrying a copy of
/// the stored task.
pub async fn stop_task(
    State(manager): State<Arc<Manager>>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    let id = match task_id.parse::<Uuid>() {
        Ok(id) => id,
        Err(e) => {
            return ResponseError::bad_request("invalid task id", e).into_response();
        }
    };

    let task = match manager.get_task(&id.to_string()) {
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
    manager.add_task(TaskEvent::new(TaskState::Completed, stopping));
    info!(task_id = %id, "stop queued");
    StatusCode::NO_CONTENT.into_response()
}
