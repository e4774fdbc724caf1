// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体、存储接口与容器运行时接口
pub mod domain;

/// 引擎模块
///
/// 分页规划与上游评论接口客户端
pub mod engines;

/// 基础设施模块
///
/// 提供外部服务集成，如 Docker、对象存储、Redis 等
pub mod infrastructure;

/// 工具模块
///
/// 提供错误类型、重试策略与日志初始化
pub mod utils;

/// 工作器模块
///
/// 工作容器的生命周期控制与任务协调
pub mod workers;
