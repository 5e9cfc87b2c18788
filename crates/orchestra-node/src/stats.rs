//! Resource snapshots gathered from the local system.

use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};

/// A point-in-time resource snapshot of a node.
///
/// Gathered on the worker and reported through its `/stats` endpoint; the
/// manager keeps the latest snapshot on each [`crate::Node`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStats {
    /// Global CPU usage, 0–100.
    pub cpu_percent: f64,
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
    pub disk_total_bytes: u64,
    pub disk_used_bytes: u64,
    /// Tasks the worker has accepted since start.
    pub task_count: u64,
}

impl NodeStats {
    /// Gather a snapshot from the local system.
    pub fn gather(sys: &System, task_count: u64) -> Self {
        let disks = Disks::new_with_refreshed_list();
        let disk_total_bytes: u64 = disks.iter().map(|d| d.total_space()).sum();
        let disk_free: u64 = disks.iter().map(|d| d.available_space()).sum();

        NodeStats {
            cpu_percent: f64::from(sys.global_cpu_usage()),
            memory_total_bytes: sys.total_memory(),
            memory_used_bytes: sys.used_memory(),
            disk_total_bytes,
            disk_used_bytes: disk_total_bytes.saturating_sub(disk_free),
            task_count,
        }
    }
}
