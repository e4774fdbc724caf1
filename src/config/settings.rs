// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// 应用程序配置设置
///
/// 包含容器、存储、队列、上游接口、重试、协调器和指标等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 容器配置
    pub docker: DockerSettings,
    /// 存储配置
    pub storage: StorageSettings,
    /// Redis配置
    pub redis: RedisSettings,
    /// 上游评论接口配置
    pub upstream: UpstreamSettings,
    /// 限流重试配置
    pub retry: RetrySettings,
    /// 任务协调器配置
    pub coordinator: CoordinatorSettings,
    /// 指标配置
    pub metrics: MetricsSettings,
}

/// 容器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DockerSettings {
    /// 工作容器镜像
    pub image: String,
    /// 容器内产物路径
    pub artifact_path: String,
    /// 宿主机产物输出目录
    pub output_dir: String,
    /// 启动时是否拉取镜像
    pub pull_on_startup: bool,
}

/// 存储配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// 存储类型 (r2, s3, local, memory)
    pub storage_type: String,
    /// 本地存储路径 (当 type=local 时使用)
    pub local_path: Option<String>,
    /// S3 区域，R2 使用 auto
    pub s3_region: Option<String>,
    /// S3 存储桶名称
    pub s3_bucket: Option<String>,
    /// S3 访问密钥
    pub s3_access_key: Option<String>,
    /// S3 密钥
    pub s3_secret_key: Option<String>,
    /// S3 端点 (R2 必填)
    pub s3_endpoint: Option<String>,
}

/// Redis配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis连接URL
    pub url: String,
}

/// 上游评论接口配置
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamSettings {
    /// 接口地址
    pub endpoint: String,
    /// 每页评论数
    pub page_size: u32,
    /// 语言过滤
    pub language: String,
    /// 单次请求超时（秒）
    pub timeout_secs: u64,
}

/// 限流重试配置
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// 最大重试次数
    pub max_retries: u32,
    /// 初始退避（毫秒）
    pub initial_backoff_ms: u64,
    /// 最大退避（毫秒）
    pub max_backoff_ms: u64,
    /// 退避乘数
    pub backoff_multiplier: f64,
    /// 抖动因子，0 表示关闭抖动
    pub jitter_factor: f64,
}

/// 任务协调器配置
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorSettings {
    /// 同时运行的最大任务数
    pub max_concurrent_jobs: usize,
}

/// 指标配置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// 是否启用 Prometheus 导出
    pub enabled: bool,
    /// 监听地址
    pub listen_addr: String,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加默认值、`config/default`、`config/{APP_ENVIRONMENT}` 与
    /// `PROVISIONER__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Self::builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("PROVISIONER").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// 只包含默认值的配置构建器
    pub fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            // Default Docker settings
            .set_default(
                "docker.image",
                "ghcr.io/algo7/tripadvisor-review-scraper/scraper:latest",
            )?
            .set_default("docker.artifact_path", "/puppeteer/reviews/All.csv")?
            .set_default("docker.output_dir", "./exports")?
            .set_default("docker.pull_on_startup", true)?
            // Default Storage settings
            .set_default("storage.storage_type", "local")?
            .set_default("storage.local_path", "./storage")?
            .set_default("storage.s3_region", "auto")?
            // Default Redis settings
            .set_default("redis.url", "redis://127.0.0.1:6379")?
            // Default Upstream settings
            .set_default(
                "upstream.endpoint",
                "https://www.tripadvisor.com/data/graphql/ids",
            )?
            .set_default("upstream.page_size", 20)?
            .set_default("upstream.language", "en")?
            .set_default("upstream.timeout_secs", 30)?
            // Default Retry settings
            .set_default("retry.max_retries", 5)?
            .set_default("retry.initial_backoff_ms", 2000)?
            .set_default("retry.max_backoff_ms", 120_000)?
            .set_default("retry.backoff_multiplier", 2.0)?
            .set_default("retry.jitter_factor", 0.2)?
            // Default Coordinator settings
            .set_default("coordinator.max_concurrent_jobs", 4)?
            // Default Metrics settings
            .set_default("metrics.enabled", false)?
            .set_default("metrics.listen_addr", "0.0.0.0:9000")
    }

    /// 校验配置
    ///
    /// 每页评论数为 0 属于配置错误；退避倍数必须是不小于 1 的有限数；
    /// R2 存储必须提供端点。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.page_size == 0 {
            return Err(ConfigError::Message(
                "upstream.page_size must be greater than zero".to_string(),
            ));
        }

        if self.coordinator.max_concurrent_jobs == 0 {
            return Err(ConfigError::Message(
                "coordinator.max_concurrent_jobs must be greater than zero".to_string(),
            ));
        }

        let retry = &self.retry;
        if !retry.backoff_multiplier.is_finite() || retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::Message(format!(
                "retry.backoff_multiplier must be a finite number >= 1.0, got {}",
                retry.backoff_multiplier
            )));
        }
        if !(0.0..=1.0).contains(&retry.jitter_factor) {
            return Err(ConfigError::Message(format!(
                "retry.jitter_factor must be within [0.0, 1.0], got {}",
                retry.jitter_factor
            )));
        }
        if retry.initial_backoff_ms > retry.max_backoff_ms {
            return Err(ConfigError::Message(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".to_string(),
            ));
        }

        match self.storage.storage_type.as_str() {
            "r2" => {
                if self.storage.s3_endpoint.as_deref().unwrap_or("").is_empty() {
                    return Err(ConfigError::Message(
                        "storage.s3_endpoint (R2 URL) must be set for r2 storage".to_string(),
                    ));
                }
                self.require_bucket()
            }
            "s3" => self.require_bucket(),
            "local" | "memory" => Ok(()),
            other => Err(ConfigError::Message(format!(
                "Unsupported storage type: {}",
                other
            ))),
        }
    }

    fn require_bucket(&self) -> Result<(), ConfigError> {
        if self.storage.s3_bucket.as_deref().unwrap_or("").is_empty() {
            return Err(ConfigError::Message(
                "storage.s3_bucket must be set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
