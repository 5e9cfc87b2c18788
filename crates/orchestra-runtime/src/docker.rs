//! Docker engine adapter over bollard.

use async_trait::async_trait;
use bollard::container::{
    CreateContainerOptions, RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::secret::{ContainerStateStatusEnum, HostConfig, RestartPolicy, RestartPolicyNameEnum};
use bollard::Docker;
use futures_util::StreamExt;
use tracing::{debug, info};

use orchestra_task::Config;

use crate::error::{RuntimeError, RuntimeResult};
use crate::{ContainerRuntime, ContainerStatus};

/// [`ContainerRuntime`] backed by a local Docker daemon.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    client: Docker,
}

impl DockerRuntime {
    /// Connect to the local daemon over its unix socket.
    pub fn connect() -> RuntimeResult<Self> {
        let client = Docker::connect_with_unix_defaults()
            .map_err(|e| RuntimeError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn run(&self, config: &Config) -> RuntimeResult<String> {
        debug!(image = %config.image, "pulling image");
        let mut pull = self.client.create_image(
            Some(CreateImageOptions {
                from_image: config.image.clone(),
                ..Default::default()
            }),
            None,
            None,
        );
        while let Some(progress) = pull.next().await {
            progress.map_err(|e| RuntimeError::ImagePull(e.to_string()))?;
        }

        let restart_policy = RestartPolicy {
            name: Some(
                config
                    .restart_policy
                    .parse()
                    .unwrap_or(RestartPolicyNameEnum::NO),
            ),
            maximum_retry_count: None,
        };

        let host_config = HostConfig {
            restart_policy: Some(restart_policy),
            memory: Some(config.memory as i64),
            nano_cpus: Some((config.cpu * 1_000_000_000.0) as i64),
            publish_all_ports: Some(true),
            ..Default::default()
        };

        let container_config = bollard::container::Config {
            image: Some(config.image.clone()),
            env: Some(config.env.clone()),
            exposed_ports: Some(
                config
                    .exposed_ports
                    .iter()
                    .map(|port| (port.clone(), Default::default()))
                    .collect(),
            ),
            host_config: Some(host_config),
            ..Default::default()
        };

        let created = self
            .client
            .create_container(
                Some(CreateContainerOptions {
                    name: config.name.clone(),
                    ..Default::default()
                }),
                container_config,
            )
            .await
            .map_err(|e| RuntimeError::Create(e.to_string()))?;

        self.client
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RuntimeError::Start(e.to_string()))?;

        info!(container_id = %created.id, image = %config.image, "container started");
        Ok(created.id)
    }

    async fn stop(&self, container_id: &str) -> RuntimeResult<()> {
        debug!(%container_id, "stopping container");
        self.client
            .stop_container(container_id, None::<StopContainerOptions>)
            .await
            .map_err(|e| RuntimeError::Stop(e.to_string()))?;

        self.client
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    v: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| RuntimeError::Remove(e.to_string()))?;

        info!(%container_id, "container stopped and removed");
        Ok(())
    }

    async fn inspect(&self, container_id: &str) -> RuntimeResult<ContainerStatus> {
        let response = self
            .client
            .inspect_container(container_id, None)
            .await
            .map_err(|e| RuntimeError::Inspect(e.to_string()))?;

        let status = response
            .state
            .and_then(|s| s.status)
            .map(|s| match s {
                ContainerStateStatusEnum::CREATED => ContainerStatus::Created,
                ContainerStateStatusEnum::RUNNING => ContainerStatus::Running,
                ContainerStateStatusEnum::PAUSED => ContainerStatus::Paused,
                ContainerStateStatusEnum::RESTARTING => ContainerStatus::Restarting,
                ContainerStateStatusEnum::EXITED => ContainerStatus::Exited,
                ContainerStateStatusEnum::DEAD => ContainerStatus::Dead,
                _ => ContainerStatus::Unknown,
            })
            .unwrap_or(ContainerStatus::Unknown);

        Ok(status)
    }
}
