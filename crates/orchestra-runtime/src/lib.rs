//! orchestra-runtime — the container engine behind a trait.
//!
//! The control plane drives the engine through [`ContainerRuntime`] and
//! never sees bollard types. [`DockerRuntime`] adapts a local Docker
//! daemon; [`FakeRuntime`] is the scripted double the worker and manager
//! tests run against.

pub mod docker;
pub mod error;
pub mod fake;

use async_trait::async_trait;

use orchestra_task::Config;

pub use docker::DockerRuntime;
pub use error::{RuntimeError, RuntimeResult};
pub use fake::FakeRuntime;

/// What the engine reports about a container's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Exited,
    Dead,
    Unknown,
}

/// An opaque adapter to a local container engine.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Pull the image, create the container, start it. Returns the
    /// engine-assigned container id.
    async fn run(&self, config: &Config) -> RuntimeResult<String>;

    /// Stop and remove the container.
    async fn stop(&self, container_id: &str) -> RuntimeResult<()>;

    /// Report the container's current lifecycle status.
    async fn inspect(&self, container_id: &str) -> RuntimeResult<ContainerStatus>;
}
