// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 任务协调器集成测试
///
/// 覆盖启动前置条件、容器创建、并发上限与关闭时的取消

#[cfg(test)]
mod tests {
    use crate::integration::helpers::{Call, FakeConnector, FakeQueue, FakeRuntime, ARTIFACT_PATH};
    use review_provisioner::domain::models::query_type::QueryType;
    use review_provisioner::domain::models::scrape_job::ScrapeRequest;
    use review_provisioner::domain::repositories::storage_repository::StorageRepository;
    use review_provisioner::infrastructure::storage::InMemoryStorage;
    use review_provisioner::utils::errors::LifecycleStep;
    use review_provisioner::workers::coordinator::join_job;
    use review_provisioner::workers::{
        JobCoordinator, JobOutcome, LifecycleConfig, StartupPreconditions, WorkerLifecycle,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    const IMAGE: &str = "scraper:test";

    struct Harness {
        coordinator: JobCoordinator,
        runtime: Arc<FakeRuntime>,
        storage: InMemoryStorage,
        _output: TempDir,
    }

    async fn harness(runtime: FakeRuntime, max_concurrent_jobs: usize) -> Harness {
        let runtime = Arc::new(runtime);
        let preconditions = StartupPreconditions::establish(
            runtime.as_ref(),
            &FakeQueue { reachable: true },
            IMAGE,
            false,
        )
        .await
        .unwrap();

        let storage = InMemoryStorage::new();
        let output = tempfile::tempdir().unwrap();
        let lifecycle = Arc::new(WorkerLifecycle::new(
            Arc::new(storage.clone()),
            LifecycleConfig {
                artifact_path: ARTIFACT_PATH.to_string(),
                output_dir: output.path().to_path_buf(),
            },
        ));

        let coordinator = JobCoordinator::new(
            preconditions,
            Arc::new(FakeConnector::new(runtime.clone())),
            lifecycle,
            max_concurrent_jobs,
        );

        Harness {
            coordinator,
            runtime,
            storage,
            _output: output,
        }
    }

    #[tokio::test]
    async fn test_preconditions_pull_image_and_check_queue() {
        let runtime = FakeRuntime::new();
        let preconditions = StartupPreconditions::establish(
            &runtime,
            &FakeQueue { reachable: true },
            IMAGE,
            true,
        )
        .await
        .unwrap();

        assert_eq!(preconditions.image(), IMAGE);
        assert!(preconditions.image_pulled());
        assert_eq!(runtime.calls(), vec![Call::Pull(IMAGE.to_string())]);
    }

    #[tokio::test]
    async fn test_preconditions_fail_when_queue_unreachable() {
        let runtime = FakeRuntime::new();
        let result = StartupPreconditions::establish(
            &runtime,
            &FakeQueue { reachable: false },
            IMAGE,
            false,
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_preconditions_fail_when_pull_fails() {
        let runtime = FakeRuntime::new().failing_pull();
        let result = StartupPreconditions::establish(
            &runtime,
            &FakeQueue { reachable: true },
            IMAGE,
            true,
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_provision_creates_named_container_with_env() {
        let h = harness(FakeRuntime::new(), 2).await;
        let request = ScrapeRequest::new("alpha", 231860, QueryType::Airline);

        let job = h.coordinator.provision(&request).await.unwrap();

        assert_eq!(job.container_id, "container-0");
        assert_eq!(job.target, "alpha");
        assert_eq!(job.upload_identifier, request.upload_identifier);

        let specs = h.runtime.specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].image, IMAGE);
        assert_eq!(specs[0].name, format!("review-scraper-{}", job.job_id));
        assert!(specs[0].env.contains(&"LOCATION_ID=231860".to_string()));
        assert!(specs[0].env.contains(&"QUERY_TYPE=AIRLINE".to_string()));
    }

    #[tokio::test]
    async fn test_run_uploads_artifact() {
        let h = harness(FakeRuntime::new(), 2).await;
        let request = ScrapeRequest::new("alpha", 1, QueryType::Hotel);
        let job = h.coordinator.provision(&request).await.unwrap();

        let outcome = h.coordinator.run(job).await.unwrap();

        assert!(matches!(outcome, JobOutcome::Uploaded { size: 3, .. }));
        assert_eq!(
            h.storage.get(&request.upload_identifier).await.unwrap(),
            Some(b"abc".to_vec())
        );
        assert_eq!(h.runtime.removals_of("container-0"), 1);
    }

    #[tokio::test]
    async fn test_run_all_respects_concurrency_limit() {
        let h = harness(
            FakeRuntime::new().with_wait_delay(Duration::from_millis(50)),
            2,
        )
        .await;

        let mut jobs = Vec::new();
        for i in 0..5 {
            let request = ScrapeRequest::new(format!("target-{}", i), i, QueryType::Hotel);
            jobs.push(h.coordinator.provision(&request).await.unwrap());
        }

        let results = h.coordinator.run_all(jobs).await;

        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(h.runtime.max_active() <= 2);
        assert_eq!(h.runtime.removals(), 5);
        assert_eq!(h.storage.len().await, 5);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_running_and_queued_jobs() {
        let h = harness(FakeRuntime::new().hanging(), 1).await;

        let mut handles = Vec::new();
        for i in 0..3 {
            let request = ScrapeRequest::new("alpha", i, QueryType::Hotel);
            let job = h.coordinator.provision(&request).await.unwrap();
            handles.push((job.job_id, h.coordinator.submit(job)));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        h.coordinator.shutdown();
        assert!(h.coordinator.is_shutting_down());

        for (job_id, handle) in handles {
            let err = join_job(job_id, handle).await.unwrap_err();
            assert!(err.is_cancelled());
            assert_eq!(err.job_id, job_id);
        }

        for i in 0..3 {
            assert_eq!(h.runtime.removals_of(&format!("container-{}", i)), 1);
        }
        assert!(h.storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported_as_connect_step() {
        let runtime = Arc::new(FakeRuntime::new());
        let preconditions = StartupPreconditions::establish(
            runtime.as_ref(),
            &FakeQueue { reachable: true },
            IMAGE,
            false,
        )
        .await
        .unwrap();
        let lifecycle = Arc::new(WorkerLifecycle::new(
            Arc::new(InMemoryStorage::new()),
            LifecycleConfig {
                artifact_path: ARTIFACT_PATH.to_string(),
                output_dir: std::env::temp_dir(),
            },
        ));
        let coordinator = JobCoordinator::new(
            preconditions,
            Arc::new(FakeConnector::failing(runtime.clone())),
            lifecycle,
            1,
        );

        let request = ScrapeRequest::new("alpha", 1, QueryType::Hotel);
        let err = coordinator.provision(&request).await.unwrap_err();

        assert_eq!(err.step, LifecycleStep::Connect);
        assert!(runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_failure_is_reported_as_provision_step() {
        let h = harness(FakeRuntime::new().failing_create(), 1).await;
        let request = ScrapeRequest::new("alpha", 1, QueryType::Hotel);

        let err = h.coordinator.provision(&request).await.unwrap_err();

        assert_eq!(err.step, LifecycleStep::Provision);
        assert!(err.to_string().contains("provision"));
        assert!(h.runtime.specs().is_empty());
        assert_eq!(h.runtime.removals(), 0);
    }
}
