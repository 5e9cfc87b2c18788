//! orchestra-worker — the node that actually runs tasks.
//!
//! A [`Worker`] accepts tasks over HTTP into a local queue, and two
//! background loops drive them: the runner dequeues one task per wake,
//! validates the requested lifecycle transition against the state
//! machine, and invokes the container runtime; the updater inspects live
//! containers and demotes tasks whose container has exited.

pub mod api;
pub mod error;
pub mod worker;

pub use api::router;
pub use error::{WorkerError, WorkerResult};
pub use worker::{run_loop, update_loop, Worker};
