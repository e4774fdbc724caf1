// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 包含的子模块：
/// - 缓存（cache）：Redis 客户端，用于任务队列连通性检查
/// - 容器（docker）：基于 bollard 的容器运行时实现
/// - 指标（metrics）：Prometheus 导出器
/// - 存储（storage）：R2 / S3 / 本地 / 内存存储实现
pub mod cache;
pub mod docker;
pub mod metrics;
pub mod storage;
