//! orchestra-task — task lifecycle types for the Orchestra control plane.
//!
//! A [`Task`] is the intended workload: a container image plus resource
//! requests and lifecycle timestamps. A [`TaskEvent`] is a desired-state
//! request carrying a task snapshot; events are the only thing that moves
//! between the submitter, the manager queue, and the worker queue. The
//! [`State`] machine in [`state`] is the single source of truth for which
//! lifecycle transitions are legal — both the manager and the worker
//! consult it before every state write.

pub mod event;
pub mod state;
pub mod task;

pub use event::TaskEvent;
pub use state::State;
pub use task::{Config, Task};
