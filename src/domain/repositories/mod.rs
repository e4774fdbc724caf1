// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 存储仓库（storage_repository）：产物上传所用的对象存储抽象
pub mod storage_repository;
