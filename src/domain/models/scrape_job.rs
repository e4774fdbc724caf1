// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::query_type::QueryType;

/// 任务唯一标识符
///
/// 每次抓取运行生成一个新的标识，用于日志关联和产物命名。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 抓取任务实体
///
/// 由任务协调器在收到抓取请求时创建，创建后不可变。
/// 一个任务对应一个工作容器，生命周期控制器返回后即被丢弃。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeJob {
    /// 任务标识
    pub job_id: JobId,
    /// 抓取目标名称（酒店 / 航空公司）
    pub target: String,
    /// 输出文件后缀
    pub file_suffix: String,
    /// 对象存储中的上传键
    pub upload_identifier: String,
    /// 工作容器标识
    pub container_id: String,
}

impl ScrapeJob {
    pub fn new(
        target: impl Into<String>,
        file_suffix: impl Into<String>,
        upload_identifier: impl Into<String>,
        container_id: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            target: target.into(),
            file_suffix: file_suffix.into(),
            upload_identifier: upload_identifier.into(),
            container_id: container_id.into(),
        }
    }

    pub fn with_job_id(mut self, job_id: JobId) -> Self {
        self.job_id = job_id;
        self
    }

    /// 宿主机上的产物文件名
    ///
    /// 格式为 `{target}-{suffix}-{job_id}.csv`，目标名中的路径分隔符和空白
    /// 会被替换，同一目标的并发任务因 job_id 不同而不会冲突。
    pub fn artifact_file_name(&self) -> String {
        format!(
            "{}-{}-{}.csv",
            sanitize(&self.target),
            sanitize(&self.file_suffix),
            self.job_id
        )
    }
}

fn sanitize(segment: &str) -> String {
    let cleaned: String = segment
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    // A bare ".." would still escape the output directory
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

/// 抓取请求解析错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScrapeRequestError {
    #[error("Invalid scrape request '{0}', expected <target>:<location_id>[:<query_type>]")]
    Malformed(String),

    #[error("Invalid location id: {0}")]
    InvalidLocation(String),
}

/// 抓取请求
///
/// 协调器收到的原始请求，经过容器创建后转换为 [`ScrapeJob`]。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub target: String,
    pub location_id: u32,
    pub query_type: QueryType,
    pub file_suffix: String,
    pub upload_identifier: String,
}

impl ScrapeRequest {
    pub fn new(target: impl Into<String>, location_id: u32, query_type: QueryType) -> Self {
        Self {
            target: target.into(),
            location_id,
            query_type,
            file_suffix: chrono::Utc::now().format("%Y%m%d%H%M%S").to_string(),
            upload_identifier: Uuid::new_v4().to_string(),
        }
    }

    /// 传递给工作容器的环境变量
    pub fn container_env(&self) -> Vec<String> {
        vec![
            format!("LOCATION_ID={}", self.location_id),
            format!("QUERY_TYPE={}", self.query_type),
            format!("TARGET_NAME={}", self.target),
            format!("FILE_SUFFIX={}", self.file_suffix),
        ]
    }
}

impl FromStr for ScrapeRequest {
    type Err = ScrapeRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let target = parts
            .next()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ScrapeRequestError::Malformed(s.to_string()))?;
        let location = parts
            .next()
            .ok_or_else(|| ScrapeRequestError::Malformed(s.to_string()))?;
        let location_id = location
            .trim()
            .parse::<u32>()
            .map_err(|_| ScrapeRequestError::InvalidLocation(location.to_string()))?;
        let query_type = parts
            .next()
            .map(QueryType::from_label)
            .unwrap_or_default();

        if parts.next().is_some() {
            return Err(ScrapeRequestError::Malformed(s.to_string()));
        }

        Ok(Self::new(target, location_id, query_type))
    }
}
