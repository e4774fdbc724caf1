// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 容器运行时接口模块
///
/// 定义主机与工作容器之间的边界：启动、等待、读取产物、删除。
/// 具体实现位于基础设施层（bollard）。
pub mod container_runtime;

pub use container_runtime::{
    ArchiveStream, ContainerRuntime, ContainerSpec, ExitOutcome, RuntimeConnector, RuntimeError,
};
