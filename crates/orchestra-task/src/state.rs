//! Task lifecycle state machine.
//!
//! The transition table lives here and nowhere else. Every state write on
//! both the manager and the worker goes through [`can_transition_to`];
//! changing the table changes behavior everywhere.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
///
/// `Completed` and `Failed` are absorbing — no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
}

impl State {
    /// Whether this state is absorbing — no transition leaves it.
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Completed | State::Failed)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            State::Pending => "pending",
            State::Scheduled => "scheduled",
            State::Running => "running",
            State::Completed => "completed",
            State::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Whether a task in `from` may be moved to `to`.
///
/// Self-transitions are legal for `Scheduled` and `Running` so that
/// idempotent retries — a re-dispatched placement, a status refresh of a
/// running task — do not fail.
pub fn can_transition_to(from: State, to: State) -> bool {
    match from {
        State::Pending => matches!(to, State::Scheduled),
        State::Scheduled => matches!(to, State::Scheduled | State::Running | State::Failed),
        State::Running => matches!(to, State::Running | State::Completed | State::Failed),
        State::Completed | State::Failed => false,
    }
}
