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

use anyhow::{bail, Context};
use review_provisioner::config::settings::Settings;
use review_provisioner::domain::models::scrape_job::{JobId, ScrapeRequest};
use review_provisioner::domain::runtime::RuntimeConnector;
use review_provisioner::infrastructure::cache::redis_client::RedisClient;
use review_provisioner::infrastructure::docker::DockerConnector;
use review_provisioner::infrastructure::metrics::init_metrics;
use review_provisioner::infrastructure::storage::create_storage_repository;
use review_provisioner::utils::telemetry;
use review_provisioner::workers::coordinator::join_job;
use review_provisioner::workers::{
    JobCoordinator, JobOutcome, LifecycleConfig, StartupPreconditions, WorkerLifecycle,
};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// 主函数
///
/// 每个命令行参数是一个 `<target>:<location_id>[:<query_type>]` 形式的抓取请求，
/// 为每个请求创建一个工作容器并并发运行。
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting review-provisioner...");

    // 2. Load configuration
    let settings = Settings::new()?;
    settings.validate()?;
    info!("Configuration loaded");

    if settings.metrics.enabled {
        init_metrics(&settings.metrics.listen_addr);
    }

    let requests = std::env::args()
        .skip(1)
        .map(|arg| arg.parse::<ScrapeRequest>())
        .collect::<Result<Vec<_>, _>>()?;
    if requests.is_empty() {
        bail!("usage: review-provisioner <target>:<location_id>[:<query_type>] ...");
    }

    // 3. Storage
    let storage = create_storage_repository(&settings.storage).await?;
    info!("Storage initialized ({})", settings.storage.storage_type);

    // 4. Startup preconditions: image + queue
    let connector = Arc::new(DockerConnector);
    let probe_runtime = connector
        .connect()
        .context("Failed to connect to Docker daemon")?;
    let redis_client = RedisClient::new(&settings.redis.url)?;
    let preconditions = StartupPreconditions::establish(
        probe_runtime.as_ref(),
        &redis_client,
        &settings.docker.image,
        settings.docker.pull_on_startup,
    )
    .await?;
    drop(probe_runtime);

    // 5. Coordinator
    let lifecycle = Arc::new(WorkerLifecycle::new(
        storage,
        LifecycleConfig::from(&settings.docker),
    ));
    let coordinator = Arc::new(JobCoordinator::new(
        preconditions,
        connector,
        lifecycle,
        settings.coordinator.max_concurrent_jobs,
    ));

    let shutdown_coordinator = Arc::clone(&coordinator);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, cancelling jobs");
            shutdown_coordinator.shutdown();
        }
    });

    let mut handles: Vec<(JobId, _)> = Vec::with_capacity(requests.len());
    let mut failed = 0usize;
    for request in &requests {
        match coordinator.provision(request).await {
            Ok(job) => handles.push((job.job_id, coordinator.submit(job))),
            Err(e) => {
                error!("Failed to provision {}: {}", request.target, e);
                failed += 1;
            }
        }
    }

    for (job_id, handle) in handles {
        match join_job(job_id, handle).await {
            Ok(JobOutcome::Uploaded { artifact, key, size }) => info!(
                "Job {} uploaded {} ({} bytes) as {}",
                job_id,
                artifact.display(),
                size,
                key
            ),
            Ok(JobOutcome::NoArtifact { exit_code }) => {
                warn!("Job {} finished without artifact (exit {})", job_id, exit_code);
                failed += 1;
            }
            Err(e) => {
                error!("{}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} jobs did not produce an artifact", failed, requests.len());
    }

    info!("All {} jobs completed", requests.len());
    Ok(())
}
