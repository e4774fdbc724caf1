// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// - 启动前置条件（preconditions）：镜像拉取与队列连通性检查
/// - 生命周期（lifecycle）：单个工作容器从启动到删除
/// - 协调器（coordinator）：并发调度多个任务
pub mod coordinator;
pub mod lifecycle;
pub mod preconditions;

pub use coordinator::JobCoordinator;
pub use lifecycle::{JobOutcome, LifecycleConfig, WorkerLifecycle};
pub use preconditions::{QueueProbe, StartupPreconditions};
