// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::domain::runtime::ContainerRuntime;

/// 任务队列连通性检查
#[async_trait]
pub trait QueueProbe: Send + Sync {
    async fn check_connection(&self) -> Result<()>;
}

/// 启动前置条件
///
/// 只能通过 [`StartupPreconditions::establish`] 获得，
/// 持有它即表示镜像已就绪且队列可达。任务协调器的构造函数要求传入它。
#[derive(Debug, Clone)]
pub struct StartupPreconditions {
    image: String,
    image_pulled: bool,
}

impl StartupPreconditions {
    /// 拉取工作镜像（可选）并检查队列连通性
    pub async fn establish(
        runtime: &dyn ContainerRuntime,
        queue: &dyn QueueProbe,
        image: &str,
        pull_image: bool,
    ) -> Result<Self> {
        if pull_image {
            runtime
                .pull_image(image)
                .await
                .with_context(|| format!("Failed to pull image {}", image))?;
        }

        queue
            .check_connection()
            .await
            .context("Queue connectivity check failed")?;
        info!("Queue connection verified");

        Ok(Self {
            image: image.to_string(),
            image_pulled: pull_image,
        })
    }

    /// 工作容器镜像
    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn image_pulled(&self) -> bool {
        self.image_pulled
    }
}
