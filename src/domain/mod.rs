// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：抓取任务、查询类型与评论数据结构
/// - 仓库接口（repositories）：产物存储抽象接口
/// - 运行时接口（runtime）：工作容器运行时抽象
///
/// 领域层不依赖于任何外部实现。
pub mod models;
pub mod repositories;
pub mod runtime;
