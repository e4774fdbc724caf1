// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::Arc;
use thiserror::Error;

/// 容器运行时错误类型
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Docker 守护进程返回的错误
    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),
    /// 其他错误
    #[error("Runtime error: {0}")]
    Other(String),
}

/// 容器等待结果
///
/// 等待操作只会产生两种结果之一：容器退出并给出状态码，
/// 或者等待协议本身失败。后者没有可信的退出码。
#[derive(Debug)]
pub enum ExitOutcome {
    /// 容器已退出
    Status(i64),
    /// 无法观察到容器退出
    WaitError(RuntimeError),
}

/// 从容器中读取的单条目 tar 归档字节流
pub type ArchiveStream = BoxStream<'static, Result<Bytes, RuntimeError>>;

/// 创建工作容器所需的参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub name: String,
    pub env: Vec<String>,
}

/// 容器运行时特质
///
/// 生命周期控制器只会调用 `start` / `wait` / `copy_from` / `remove`，
/// `pull_image` 与 `create` 供启动检查和任务协调器使用。
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// 拉取或更新镜像
    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError>;

    /// 创建容器，返回容器ID
    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    /// 启动容器
    async fn start(&self, container_id: &str) -> Result<(), RuntimeError>;

    /// 阻塞等待容器进入非运行状态
    async fn wait(&self, container_id: &str) -> ExitOutcome;

    /// 以 tar 流的形式读取容器内的路径
    async fn copy_from(&self, container_id: &str, path: &str)
        -> Result<ArchiveStream, RuntimeError>;

    /// 强制删除容器
    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError>;
}

/// 运行时连接器
///
/// 每个任务通过连接器获得独立的运行时连接，不在任务之间复用。
pub trait RuntimeConnector: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn ContainerRuntime>, RuntimeError>;
}
