//! orchestra-store — keyed persistence and the pending-work queue.
//!
//! [`Storage`] wraps a redb database (on-disk or in-memory) and hands out
//! typed [`Store`] views over named tables. All values are JSON-serialized
//! into redb's `&[u8]` value columns; keys are strings (task and event ids
//! in RFC-4122 text form). [`PendingQueue`] is the FIFO both tiers use to
//! buffer work between their HTTP handlers and their loops.

pub mod error;
pub mod queue;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use queue::PendingQueue;
pub use store::{Storage, Store};
