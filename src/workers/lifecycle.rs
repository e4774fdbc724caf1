// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 工作容器生命周期控制
//!
//! 一次 [`WorkerLifecycle::scrape`] 调用拥有一个容器的完整生命周期：
//!
//! ```text
//! Created → Started → Waiting ─┬─ WaitError ─────────────────────────┐
//!                              ├─ Failed (exit != 0) ─────────────────┤
//!                              └─ Succeeded → Extracted → Uploaded ──┴→ Removed
//! ```
//!
//! 无论在哪一步失败或被取消，删除容器都会且只会执行一次。

use futures::StreamExt;
use metrics::{counter, histogram};
use std::future::Future;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::settings::DockerSettings;
use crate::domain::models::scrape_job::ScrapeJob;
use crate::domain::repositories::storage_repository::StorageRepository;
use crate::domain::runtime::{ContainerRuntime, ExitOutcome};
use crate::utils::errors::{LifecycleError, LifecycleStep, StepFailure};

/// 生命周期配置
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// 容器内产物路径
    pub artifact_path: String,
    /// 宿主机输出目录
    pub output_dir: PathBuf,
}

impl From<&DockerSettings> for LifecycleConfig {
    fn from(settings: &DockerSettings) -> Self {
        Self {
            artifact_path: settings.artifact_path.clone(),
            output_dir: PathBuf::from(&settings.output_dir),
        }
    }
}

/// 生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Created,
    Started,
    Waiting,
    Succeeded,
    Failed,
    WaitError,
    Extracted,
    Uploaded,
    Removed,
}

/// 任务的正常结束结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// 产物已提取并上传
    Uploaded {
        artifact: PathBuf,
        key: String,
        size: usize,
    },
    /// 容器以非零状态退出，没有产物
    NoArtifact { exit_code: i64 },
}

impl JobOutcome {
    fn label(&self) -> &'static str {
        match self {
            JobOutcome::Uploaded { .. } => "uploaded",
            JobOutcome::NoArtifact { .. } => "no_artifact",
        }
    }
}

type StepResult<T> = Result<T, (LifecycleStep, StepFailure)>;

/// 工作容器生命周期控制器
///
/// 控制器本身不持有任何任务状态，可以被多个任务并发调用。
pub struct WorkerLifecycle {
    storage: Arc<dyn StorageRepository>,
    config: LifecycleConfig,
}

impl WorkerLifecycle {
    pub fn new(storage: Arc<dyn StorageRepository>, config: LifecycleConfig) -> Self {
        Self { storage, config }
    }

    /// 运行一个抓取任务的完整生命周期
    ///
    /// # 参数
    ///
    /// * `runtime` - 该任务独占的运行时连接
    /// * `job` - 抓取任务
    /// * `cancel` - 该任务的取消令牌
    ///
    /// # 返回值
    ///
    /// * `Ok(JobOutcome::Uploaded)` - 产物已上传
    /// * `Ok(JobOutcome::NoArtifact)` - 容器非零退出
    /// * `Err(LifecycleError)` - 某一步骤失败，携带任务ID与步骤
    #[instrument(
        skip_all,
        fields(job_id = %job.job_id, container_id = %job.container_id, target = %job.target)
    )]
    pub async fn scrape(
        &self,
        runtime: Arc<dyn ContainerRuntime>,
        job: &ScrapeJob,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome, LifecycleError> {
        let started_at = Instant::now();
        enter(JobStage::Created);

        let lease = ContainerLease::new(Arc::clone(&runtime), job.container_id.clone());
        let result = self.run_steps(runtime.as_ref(), job, cancel).await;
        let removal = lease.release().await;
        enter(JobStage::Removed);

        histogram!("scrape_job_duration_seconds").record(started_at.elapsed().as_secs_f64());

        match (result, removal) {
            (Ok(outcome), Ok(())) => {
                counter!("scrape_jobs_total", "outcome" => outcome.label()).increment(1);
                match &outcome {
                    JobOutcome::Uploaded { key, size, .. } => {
                        info!("Job completed, uploaded {} bytes as {}", size, key)
                    }
                    JobOutcome::NoArtifact { exit_code } => {
                        info!("Job completed without artifact, exit code {}", exit_code)
                    }
                }
                Ok(outcome)
            }
            (Ok(_), Err(e)) => {
                counter!("scrape_jobs_total", "outcome" => "failed").increment(1);
                error!("Failed to remove container: {}", e);
                Err(LifecycleError::new(job.job_id, LifecycleStep::Remove, e))
            }
            (Err((step, failure)), removal) => {
                counter!("scrape_jobs_total", "outcome" => "failed").increment(1);
                if let Err(e) = removal {
                    warn!("Container removal after failed {} step also failed: {}", step, e);
                }
                error!("Job failed at {}: {}", step, failure);
                Err(LifecycleError::new(job.job_id, step, failure))
            }
        }
    }

    async fn run_steps(
        &self,
        runtime: &dyn ContainerRuntime,
        job: &ScrapeJob,
        cancel: &CancellationToken,
    ) -> StepResult<JobOutcome> {
        guarded(cancel, LifecycleStep::Start, async {
            runtime.start(&job.container_id).await.map_err(StepFailure::from)
        })
        .await?;
        enter(JobStage::Started);

        enter(JobStage::Waiting);
        let exit = guarded(cancel, LifecycleStep::Wait, async {
            Ok(runtime.wait(&job.container_id).await)
        })
        .await?;

        match exit {
            ExitOutcome::WaitError(e) => {
                enter(JobStage::WaitError);
                return Err((LifecycleStep::Wait, e.into()));
            }
            ExitOutcome::Status(code) if code != 0 => {
                enter(JobStage::Failed);
                warn!("Container exited with status {}", code);
                return Ok(JobOutcome::NoArtifact { exit_code: code });
            }
            ExitOutcome::Status(_) => enter(JobStage::Succeeded),
        }

        let artifact = guarded(cancel, LifecycleStep::Extract, self.extract(runtime, job)).await?;
        enter(JobStage::Extracted);

        let size = guarded(cancel, LifecycleStep::Upload, self.upload(job, &artifact)).await?;
        enter(JobStage::Uploaded);

        Ok(JobOutcome::Uploaded {
            artifact,
            key: job.upload_identifier.clone(),
            size,
        })
    }

    /// 读取容器内的产物归档，把第一个文件条目写到宿主机
    async fn extract(
        &self,
        runtime: &dyn ContainerRuntime,
        job: &ScrapeJob,
    ) -> Result<PathBuf, StepFailure> {
        let stream = runtime
            .copy_from(&job.container_id, &self.config.artifact_path)
            .await?;

        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        let path = self.config.output_dir.join(job.artifact_file_name());

        // The bridge must be created on the async side; it blocks on this runtime's handle
        let reader = SyncIoBridge::new(StreamReader::new(
            stream.map(|chunk| chunk.map_err(std::io::Error::other)),
        ));
        let dest = path.clone();
        let written = tokio::task::spawn_blocking(move || copy_first_entry(reader, &dest))
            .await
            .map_err(|e| StepFailure::Archive(e.to_string()))??;

        debug!("Copied {} bytes out of container archive", written);
        info!("Artifact written to {}", path.display());
        Ok(path)
    }

    async fn upload(&self, job: &ScrapeJob, artifact: &Path) -> Result<usize, StepFailure> {
        let contents = tokio::fs::read(artifact).await?;
        self.storage
            .upload(&job.upload_identifier, &contents)
            .await?;
        Ok(contents.len())
    }
}

/// 把归档中第一个普通文件条目流式写入 `dest`
///
/// 不依据条目头声明的大小预分配内存。条目数据短于头中声明的大小时视为
/// 归档损坏，并删除已写出的部分文件。
///
/// # 返回值
///
/// 写入的字节数
pub fn copy_first_entry<R: Read>(archive: R, dest: &Path) -> Result<u64, StepFailure> {
    let mut archive = tar::Archive::new(archive);
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let declared = entry.size();
        let mut file = std::fs::File::create(dest)?;
        let written = match std::io::copy(&mut entry, &mut file) {
            Ok(written) => written,
            Err(e) => {
                drop(file);
                let _ = std::fs::remove_file(dest);
                return Err(e.into());
            }
        };

        if written != declared {
            drop(file);
            let _ = std::fs::remove_file(dest);
            return Err(StepFailure::Archive(format!(
                "entry truncated: header declares {} bytes, archive holds {}",
                declared, written
            )));
        }
        return Ok(written);
    }

    Err(StepFailure::Archive(
        "archive contains no file entry".to_string(),
    ))
}

fn enter(stage: JobStage) {
    debug!(stage = ?stage, "Job stage transition");
}

/// 在取消令牌与步骤之间竞争，取消优先
async fn guarded<T, F>(cancel: &CancellationToken, step: LifecycleStep, fut: F) -> StepResult<T>
where
    F: Future<Output = Result<T, StepFailure>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err((step, StepFailure::Cancelled)),
        result = fut => result.map_err(|failure| (step, failure)),
    }
}

/// 容器租约
///
/// 正常路径通过 `release` 删除容器。如果任务 future 在释放前被丢弃
/// （任务被中止或发生 panic），在 Drop 中把删除交给后台任务。
struct ContainerLease {
    runtime: Arc<dyn ContainerRuntime>,
    container_id: String,
    released: bool,
}

impl ContainerLease {
    fn new(runtime: Arc<dyn ContainerRuntime>, container_id: String) -> Self {
        Self {
            runtime,
            container_id,
            released: false,
        }
    }

    async fn release(mut self) -> Result<(), crate::domain::runtime::RuntimeError> {
        self.released = true;
        counter!("container_removals_total").increment(1);
        self.runtime.remove(&self.container_id).await
    }
}

impl Drop for ContainerLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let runtime = Arc::clone(&self.runtime);
        let container_id = std::mem::take(&mut self.container_id);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Job dropped before teardown, removing container {} in background", container_id);
                counter!("container_removals_total").increment(1);
                handle.spawn(async move {
                    if let Err(e) = runtime.remove(&container_id).await {
                        error!("Background removal of container {} failed: {}", container_id, e);
                    }
                });
            }
            Err(_) => error!(
                "No runtime available to remove container {}, it must be removed manually",
                container_id
            ),
        }
    }
}
