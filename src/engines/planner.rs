// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::PlanError;

/// 计算抓取全部评论所需的分页次数（向上取整）
pub fn iterations(total_count: u32, page_size: u32) -> Result<u32, PlanError> {
    if page_size == 0 {
        return Err(PlanError::ZeroPageSize);
    }

    let full_pages = total_count / page_size;
    if total_count % page_size != 0 {
        Ok(full_pages + 1)
    } else {
        Ok(full_pages)
    }
}

/// 计算第 `iteration` 页（从 0 开始）的偏移量
pub fn offset(iteration: u32, page_size: u32) -> Result<u32, PlanError> {
    if page_size == 0 {
        return Err(PlanError::ZeroPageSize);
    }

    iteration
        .checked_mul(page_size)
        .ok_or(PlanError::OffsetOverflow {
            iteration,
            page_size,
        })
}

/// 分页计划
///
/// 针对单个目标按总数计算，不跨目标缓存。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationPlan {
    pub total_count: u32,
    pub page_size: u32,
    pub iterations: u32,
}

impl IterationPlan {
    pub fn new(total_count: u32, page_size: u32) -> Result<Self, PlanError> {
        Ok(Self {
            total_count,
            page_size,
            iterations: iterations(total_count, page_size)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.iterations == 0
    }

    /// 依次产出每一页的偏移量
    ///
    /// 最后一页的偏移量 `(iterations - 1) * page_size` 小于 `total_count`，不会溢出。
    pub fn offsets(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.iterations).map(move |i| i * self.page_size)
    }
}
