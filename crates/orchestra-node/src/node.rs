//! The node descriptor.

use serde::{Deserialize, Serialize};

use crate::stats::NodeStats;

/// A worker node as the manager sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Logical name, the `host:port` the worker was registered under.
    pub name: String,
    pub ip: String,
    pub role: String,
    /// Base URL of the worker's task API.
    pub api: String,
    /// Last-known resource snapshot.
    pub stats: NodeStats,
}

impl Node {
    /// Describe a worker registered under `name` (`host:port`).
    pub fn new(name: impl Into<String>, api: impl Into<String>, role: impl Into<String>) -> Self {
        let name = name.into();
        let ip = name.split(':').next().unwrap_or_default().to_string();
        Node {
            name,
            ip,
            role: role.into(),
            api: api.into(),
            stats: NodeStats::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_derives_ip_from_name() {
        let node = Node::new("10.0.0.7:5556", "http://10.0.0.7:5556/tasks", "worker");
        assert_eq!(node.name, "10.0.0.7:5556");
        assert_eq!(node.ip, "10.0.0.7");
        assert_eq!(node.role, "worker");
        assert_eq!(node.api, "http://10.0.0.7:5556/tasks");
    }

    #[test]
    fn stats_start_zeroed() {
        let node = Node::new("w1:5556", "http://w1:5556/tasks", "worker");
        assert_eq!(node.stats, NodeStats::default());
    }
}
