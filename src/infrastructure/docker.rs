// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, DownloadFromContainerOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::runtime::{
    ArchiveStream, ContainerRuntime, ContainerSpec, ExitOutcome, RuntimeConnector, RuntimeError,
};

/// 基于 bollard 的 Docker 运行时
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// 按环境变量（DOCKER_HOST 等）连接本地 Docker 守护进程
    pub fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        info!("Pulling image {}", image);
        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };

        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(update) = progress.next().await {
            let update = update?;
            if let Some(status) = update.status {
                debug!("{}: {}", image, status);
            }
        }

        info!("Image {} is up to date", image);
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let options = CreateContainerOptions {
            name: spec.name.as_str(),
            ..Default::default()
        };
        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            ..Default::default()
        };

        let response = self.docker.create_container(Some(options), config).await?;
        Ok(response.id)
    }

    async fn start(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn wait(&self, container_id: &str) -> ExitOutcome {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut stream = self.docker.wait_container(container_id, Some(options));

        match stream.next().await {
            Some(Ok(response)) => ExitOutcome::Status(response.status_code),
            // bollard reports a non-zero exit as an error carrying the exit code
            Some(Err(DockerError::DockerContainerWaitError { code, .. })) => {
                ExitOutcome::Status(code)
            }
            Some(Err(e)) => ExitOutcome::WaitError(e.into()),
            None => ExitOutcome::WaitError(RuntimeError::Other(format!(
                "wait stream for container {} closed without a status",
                container_id
            ))),
        }
    }

    async fn copy_from(
        &self,
        container_id: &str,
        path: &str,
    ) -> Result<ArchiveStream, RuntimeError> {
        let options = DownloadFromContainerOptions {
            path: path.to_string(),
        };
        let stream = self
            .docker
            .download_from_container(container_id, Some(options))
            .map_err(RuntimeError::from);
        Ok(stream.boxed())
    }

    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(container_id, Some(options))
            .await?;
        Ok(())
    }
}

/// 每次调用创建新的 Docker 连接
#[derive(Debug, Default, Clone, Copy)]
pub struct DockerConnector;

impl RuntimeConnector for DockerConnector {
    fn connect(&self) -> Result<Arc<dyn ContainerRuntime>, RuntimeError> {
        Ok(Arc::new(DockerRuntime::connect()?))
    }
}
