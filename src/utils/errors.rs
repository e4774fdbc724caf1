// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::fmt;
use thiserror::Error;

use crate::domain::models::scrape_job::JobId;
use crate::domain::repositories::storage_repository::StorageError;
use crate::domain::runtime::RuntimeError;

/// 分页规划错误
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    #[error("Page size must be greater than zero")]
    ZeroPageSize,

    #[error("Offset overflow at iteration {iteration} with page size {page_size}")]
    OffsetOverflow { iteration: u32, page_size: u32 },
}

/// 上游评论接口错误类型
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// 请求发送失败
    #[error("Error sending request: {0}")]
    Transport(#[from] reqwest::Error),

    /// 被上游限流（HTTP 429）
    #[error("Rate limit detected: {status}")]
    RateLimited { status: u16 },

    /// 其他非 200 状态
    #[error("Error response status code: {0}")]
    Status(u16),

    /// 响应体解析失败
    #[error("Error parsing response body: {0}")]
    Parse(#[from] serde_json::Error),

    /// 响应中没有任何地点
    #[error("No reviews found for location ID {0}")]
    NotFound(u32),

    /// 上游没有返回任何响应对象
    #[error("Received nil response for location ID {0}")]
    NilResponse(u32),

    /// 分页参数无效
    #[error("Invalid pagination: {0}")]
    Plan(#[from] PlanError),
}

impl UpstreamError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UpstreamError::RateLimited { .. })
    }

    /// 判断错误是否值得退避后重试
    ///
    /// 限流和瞬时网络错误可以重试；状态码错误、解析错误和空结果不重试。
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::RateLimited { .. } => true,
            UpstreamError::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// 生命周期步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleStep {
    Connect,
    Provision,
    Start,
    Wait,
    Extract,
    Upload,
    Remove,
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleStep::Connect => "connect",
            LifecycleStep::Provision => "provision",
            LifecycleStep::Start => "start",
            LifecycleStep::Wait => "wait",
            LifecycleStep::Extract => "extract",
            LifecycleStep::Upload => "upload",
            LifecycleStep::Remove => "remove",
        };
        write!(f, "{}", name)
    }
}

/// 单个步骤的失败原因
#[derive(Error, Debug)]
pub enum StepFailure {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Job panicked: {0}")]
    Panicked(String),
}

/// 生命周期错误
///
/// 携带任务ID与失败步骤，供外部重试策略使用。
#[derive(Error, Debug)]
#[error("Job {job_id} failed at {step}: {source}")]
pub struct LifecycleError {
    pub job_id: JobId,
    pub step: LifecycleStep,
    #[source]
    pub source: StepFailure,
}

impl LifecycleError {
    pub fn new(job_id: JobId, step: LifecycleStep, source: impl Into<StepFailure>) -> Self {
        Self {
            job_id,
            step,
            source: source.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, StepFailure::Cancelled)
    }
}
