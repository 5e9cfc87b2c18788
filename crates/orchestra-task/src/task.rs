//! The task type and its container-config projection.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::State;

/// A unit of containerized work with lifecycle state.
///
/// The `id` is assigned at creation and never mutates. `container_id` is
/// empty until the runtime returns one and is written exactly once per
/// placement. `end_time` is set when the task reaches a terminal state.
/// Unknown fields are rejected on decode so that an event body is
/// refused all the way down, not just at its top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Task {
    pub id: Uuid,
    pub state: State,
    pub name: String,
    pub image: String,
    /// CPU request in cores.
    pub cpu: f64,
    /// Memory request in bytes.
    pub memory: u64,
    /// Disk request in bytes.
    pub disk: u64,
    pub restart_policy: String,
    /// Ports the container exposes, in `"80/tcp"` form.
    pub exposed_ports: Vec<String>,
    pub port_bindings: HashMap<String, String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub container_id: Option<String>,
}

impl Task {
    /// Create a pending task for the given image.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Task {
            id: Uuid::new_v4(),
            state: State::Pending,
            name: name.into(),
            image: image.into(),
            cpu: 0.0,
            memory: 0,
            disk: 0,
            restart_policy: String::new(),
            exposed_ports: Vec::new(),
            port_bindings: HashMap::new(),
            start_time: None,
            end_time: None,
            container_id: None,
        }
    }
}

/// Container configuration handed to the runtime.
///
/// A projection of [`Task`] onto what the engine needs to create and start
/// a container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    pub image: String,
    /// CPU limit in cores.
    pub cpu: f64,
    /// Memory limit in bytes.
    pub memory: u64,
    pub env: Vec<String>,
    pub restart_policy: String,
    pub exposed_ports: Vec<String>,
}

impl From<&Task> for Config {
    fn from(task: &Task) -> Self {
        Config {
            name: task.name.clone(),
            image: task.image.clone(),
            cpu: task.cpu,
            memory: task.memory,
            env: Vec::new(),
            restart_policy: task.restart_policy.clone(),
            exposed_ports: task.exposed_ports.clone(),
        }
    }
}
