// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::models::scrape_job::{JobId, ScrapeJob, ScrapeRequest};
use crate::domain::runtime::{ContainerSpec, RuntimeConnector};
use crate::utils::errors::{LifecycleError, LifecycleStep, StepFailure};
use crate::workers::lifecycle::{JobOutcome, WorkerLifecycle};
use crate::workers::preconditions::StartupPreconditions;

/// 单个任务的执行结果
pub type JobResult = Result<JobOutcome, LifecycleError>;

/// 任务协调器
///
/// 为每个请求创建工作容器，并把任务交给生命周期控制器。
/// 每个任务在独立的 tokio 任务中运行，拥有独立的运行时连接和取消令牌，
/// 同时运行的任务数受信号量限制。
pub struct JobCoordinator {
    preconditions: StartupPreconditions,
    connector: Arc<dyn RuntimeConnector>,
    lifecycle: Arc<WorkerLifecycle>,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl JobCoordinator {
    /// 创建任务协调器
    ///
    /// 需要传入已建立的 [`StartupPreconditions`]，保证镜像与队列在调度前已就绪。
    pub fn new(
        preconditions: StartupPreconditions,
        connector: Arc<dyn RuntimeConnector>,
        lifecycle: Arc<WorkerLifecycle>,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            preconditions,
            connector,
            lifecycle,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            shutdown: CancellationToken::new(),
        }
    }

    /// 为请求创建工作容器，返回可提交的任务
    pub async fn provision(&self, request: &ScrapeRequest) -> Result<ScrapeJob, LifecycleError> {
        let job_id = JobId::new();
        let runtime = self
            .connector
            .connect()
            .map_err(|e| LifecycleError::new(job_id, LifecycleStep::Connect, e))?;

        let spec = ContainerSpec {
            image: self.preconditions.image().to_string(),
            name: format!("review-scraper-{}", job_id),
            env: request.container_env(),
        };
        let container_id = runtime
            .create(&spec)
            .await
            .map_err(|e| LifecycleError::new(job_id, LifecycleStep::Provision, e))?;

        info!(
            "Provisioned container {} for {} (location {})",
            container_id, request.target, request.location_id
        );

        Ok(ScrapeJob::new(
            request.target.clone(),
            request.file_suffix.clone(),
            request.upload_identifier.clone(),
            container_id,
        )
        .with_job_id(job_id))
    }

    /// 提交任务，立即返回任务句柄
    ///
    /// 已取消的任务仍会进入生命周期控制器，由它完成容器删除。
    pub fn submit(&self, job: ScrapeJob) -> JoinHandle<JobResult> {
        let permits = Arc::clone(&self.permits);
        let connector = Arc::clone(&self.connector);
        let lifecycle = Arc::clone(&self.lifecycle);
        let cancel = self.shutdown.child_token();

        tokio::spawn(async move {
            let _permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = permits.acquire_owned() => permit.ok(),
            };

            let runtime = match connector.connect() {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!(
                        "Cannot connect to runtime for job {}, container {} is left behind",
                        job.job_id, job.container_id
                    );
                    return Err(LifecycleError::new(job.job_id, LifecycleStep::Connect, e));
                }
            };

            lifecycle.scrape(runtime, &job, &cancel).await
        })
    }

    /// 提交任务并等待其完成
    pub async fn run(&self, job: ScrapeJob) -> JobResult {
        let job_id = job.job_id;
        let handle = self.submit(job);
        join_job(job_id, handle).await
    }

    /// 并发运行一批任务，按提交顺序返回结果
    pub async fn run_all(&self, jobs: Vec<ScrapeJob>) -> Vec<JobResult> {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| (job.job_id, self.submit(job)))
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (job_id, handle) in handles {
            results.push(join_job(job_id, handle).await);
        }
        results
    }

    /// 取消所有进行中和排队中的任务
    pub fn shutdown(&self) {
        warn!("Shutting down job coordinator");
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// 等待任务句柄，把 panic 与中止转换为生命周期错误
pub async fn join_job(job_id: JobId, handle: JoinHandle<JobResult>) -> JobResult {
    handle
        .await
        .unwrap_or_else(|e| Err(join_failure(job_id, e)))
}

fn join_failure(job_id: JobId, e: JoinError) -> LifecycleError {
    if e.is_panic() {
        error!("Job {} panicked: {}", job_id, e);
        LifecycleError::new(job_id, LifecycleStep::Wait, StepFailure::Panicked(e.to_string()))
    } else {
        LifecycleError::new(job_id, LifecycleStep::Wait, StepFailure::Cancelled)
    }
}
