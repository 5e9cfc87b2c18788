//! orchestra-manager — the control-plane node that places work.
//!
//! The [`Manager`] accepts desired-state events over HTTP into a pending
//! queue. Its dispatcher loop dequeues one event per wake, consults the
//! [`orchestra_scheduler::Scheduler`] to pick a worker, records the
//! placement, and hands the event off with an HTTP POST — re-enqueueing
//! on transport failure for at-least-once delivery. Its reconciliation
//! loop polls every worker and merges observed task state back into the
//! manager's store, guarded by the state machine.

pub mod api;
pub mod client;
pub mod error;
pub mod manager;
pub mod retry;

pub use api::router;
pub use client::WorkerClient;
pub use error::{ManagerError, ManagerResult};
pub use manager::{dispatch_loop, reconcile_loop, Manager};
pub use retry::{with_retry, RetryOptions};
