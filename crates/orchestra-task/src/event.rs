//! Desired-state events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::State;
use crate::task::Task;

/// A desired-state request targeting a task.
///
/// Events are immutable once enqueued; the embedded task's id is the
/// routing key. Unknown fields are rejected on decode — the `POST /tasks`
/// surfaces on both manager and worker take this type as their body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskEvent {
    pub id: Uuid,
    /// The desired state; clients may only request `Scheduled` or
    /// `Completed`.
    pub state: State,
    pub timestamp: DateTime<Utc>,
    pub task: Task,
}

impl TaskEvent {
    /// Create an event requesting `state` for `task`, stamped now.
    pub fn new(state: State, task: Task) -> Self {
        TaskEvent {
            id: Uuid::new_v4(),
            state,
            timestamp: Utc::now(),
            task,
        }
    }
}
