// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// - 查询类型（query_type）：酒店 / 航空公司评论查询
/// - 评论（review）：上游评论接口的请求与响应结构
/// - 抓取任务（scrape_job）：一个工作容器对应的任务
pub mod query_type;
pub mod review;
pub mod scrape_job;
