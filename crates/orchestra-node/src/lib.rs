//! orchestra-node — worker node descriptors held by the manager.
//!
//! A [`Node`] names a worker, its API endpoint, and its last-known
//! resource snapshot. Nodes are created at manager construction from the
//! static worker address list; only the stats snapshot mutates afterwards.

pub mod node;
pub mod stats;

pub use node::Node;
pub use stats::NodeStats;
