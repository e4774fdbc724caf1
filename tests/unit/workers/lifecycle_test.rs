// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 生命周期控制器测试
///
/// 使用可注入故障的模拟运行时，验证每条路径上容器都只被删除一次

#[cfg(test)]
mod tests {
    use crate::integration::helpers::{csv_archive, Call, FakeRuntime, ARTIFACT_PATH};
    use review_provisioner::domain::models::scrape_job::ScrapeJob;
    use async_trait::async_trait;
    use review_provisioner::domain::repositories::storage_repository::{
        StorageError, StorageRepository,
    };
    use review_provisioner::infrastructure::storage::InMemoryStorage;
    use review_provisioner::utils::errors::{LifecycleStep, StepFailure};
    use review_provisioner::workers::{JobOutcome, LifecycleConfig, WorkerLifecycle};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        lifecycle: WorkerLifecycle,
        storage: InMemoryStorage,
        output: TempDir,
    }

    fn fixture() -> Fixture {
        let storage = InMemoryStorage::new();
        let output = tempfile::tempdir().unwrap();
        let lifecycle = WorkerLifecycle::new(
            Arc::new(storage.clone()),
            LifecycleConfig {
                artifact_path: ARTIFACT_PATH.to_string(),
                output_dir: output.path().to_path_buf(),
            },
        );
        Fixture {
            lifecycle,
            storage,
            output,
        }
    }

    /// 所有上传都失败的存储
    struct RejectingStorage;

    #[async_trait]
    impl StorageRepository for RejectingStorage {
        async fn upload(&self, _key: &str, _data: &[u8]) -> Result<(), StorageError> {
            Err(StorageError::Other("bucket unavailable".to_string()))
        }

        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageError> {
            Ok(None)
        }
    }

    fn job() -> ScrapeJob {
        ScrapeJob::new("alpha", "20240101", "upload-1", "abc")
    }

    #[tokio::test]
    async fn test_successful_job_extracts_uploads_and_removes() {
        let fx = fixture();
        let runtime = Arc::new(FakeRuntime::new());
        let job = job();

        let outcome = fx
            .lifecycle
            .scrape(runtime.clone(), &job, &CancellationToken::new())
            .await
            .unwrap();

        let expected_path = fx.output.path().join(job.artifact_file_name());
        assert_eq!(
            outcome,
            JobOutcome::Uploaded {
                artifact: expected_path.clone(),
                key: "upload-1".to_string(),
                size: 3,
            }
        );
        assert_eq!(std::fs::read(&expected_path).unwrap(), b"abc");
        assert_eq!(fx.storage.get("upload-1").await.unwrap(), Some(b"abc".to_vec()));
        assert_eq!(fx.storage.len().await, 1);

        assert_eq!(
            runtime.calls(),
            vec![
                Call::Start("abc".to_string()),
                Call::Wait("abc".to_string()),
                Call::CopyFrom("abc".to_string(), ARTIFACT_PATH.to_string()),
                Call::Remove("abc".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_skips_extraction_and_upload() {
        let fx = fixture();
        let runtime = Arc::new(FakeRuntime::new().with_exit(1));

        let outcome = fx
            .lifecycle
            .scrape(runtime.clone(), &job(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, JobOutcome::NoArtifact { exit_code: 1 });
        assert_eq!(runtime.copies(), 0);
        assert!(fx.storage.is_empty().await);
        assert_eq!(runtime.removals_of("abc"), 1);
    }

    #[tokio::test]
    async fn test_wait_error_fails_job_and_removes_container() {
        let fx = fixture();
        let runtime = Arc::new(FakeRuntime::new().with_wait_error());

        let err = fx
            .lifecycle
            .scrape(runtime.clone(), &job(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.step, LifecycleStep::Wait);
        assert!(matches!(err.source, StepFailure::Runtime(_)));
        assert_eq!(runtime.copies(), 0);
        assert!(fx.storage.is_empty().await);
        assert_eq!(runtime.removals(), 1);
    }

    #[tokio::test]
    async fn test_missing_artifact_fails_extract_without_upload() {
        let fx = fixture();
        let runtime = Arc::new(FakeRuntime::new().without_archive());

        let err = fx
            .lifecycle
            .scrape(runtime.clone(), &job(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.step, LifecycleStep::Extract);
        assert!(fx.storage.is_empty().await);
        assert_eq!(runtime.removals(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_archive_fails_extract() {
        let fx = fixture();
        let runtime = Arc::new(FakeRuntime::new().with_archive(vec![0xff; 1024]));

        let err = fx
            .lifecycle
            .scrape(runtime.clone(), &job(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.step, LifecycleStep::Extract);
        assert!(fx.storage.is_empty().await);
        assert_eq!(runtime.removals(), 1);
    }

    #[tokio::test]
    async fn test_start_failure_still_removes_container() {
        let fx = fixture();
        let runtime = Arc::new(FakeRuntime::new().failing_start());

        let err = fx
            .lifecycle
            .scrape(runtime.clone(), &job(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.step, LifecycleStep::Start);
        assert_eq!(
            runtime.calls(),
            vec![Call::Start("abc".to_string()), Call::Remove("abc".to_string())]
        );
    }

    #[tokio::test]
    async fn test_remove_failure_is_reported_after_upload() {
        let fx = fixture();
        let runtime = Arc::new(FakeRuntime::new().failing_remove());
        let job = job();

        let err = fx
            .lifecycle
            .scrape(runtime.clone(), &job, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.step, LifecycleStep::Remove);
        assert_eq!(err.job_id, job.job_id);
        assert_eq!(fx.storage.len().await, 1);
        assert_eq!(runtime.removals(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_during_wait_removes_container() {
        let fx = fixture();
        let runtime = Arc::new(FakeRuntime::new().hanging());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = fx
            .lifecycle
            .scrape(runtime.clone(), &job(), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.step, LifecycleStep::Wait);
        assert_eq!(runtime.copies(), 0);
        assert_eq!(runtime.removals(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_only_removes() {
        let fx = fixture();
        let runtime = Arc::new(FakeRuntime::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fx
            .lifecycle
            .scrape(runtime.clone(), &job(), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.step, LifecycleStep::Start);
        assert_eq!(runtime.calls(), vec![Call::Remove("abc".to_string())]);
    }

    #[tokio::test]
    async fn test_artifact_contents_are_preserved_byte_for_byte() {
        let fx = fixture();
        let csv = b"id,rating,title\n1,5,\"Great, would return\"\n2,3,ok\n";
        let runtime = Arc::new(FakeRuntime::new().with_archive(csv_archive("All.csv", csv)));

        fx.lifecycle
            .scrape(runtime, &job(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(fx.storage.get("upload-1").await.unwrap(), Some(csv.to_vec()));
    }

    #[tokio::test]
    async fn test_upload_failure_is_reported_and_container_removed() {
        let output = tempfile::tempdir().unwrap();
        let lifecycle = WorkerLifecycle::new(
            Arc::new(RejectingStorage),
            LifecycleConfig {
                artifact_path: ARTIFACT_PATH.to_string(),
                output_dir: output.path().to_path_buf(),
            },
        );
        let runtime = Arc::new(FakeRuntime::new());
        let job = job();

        let err = lifecycle
            .scrape(runtime.clone(), &job, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.step, LifecycleStep::Upload);
        assert_eq!(err.job_id, job.job_id);
        assert!(matches!(err.source, StepFailure::Storage(_)));
        assert_eq!(runtime.removals_of("abc"), 1);
        // Extraction finished before the upload was attempted
        assert!(output.path().join(job.artifact_file_name()).exists());
    }

    #[tokio::test]
    async fn test_oversized_entry_header_fails_extract_without_allocating() {
        let fx = fixture();
        let mut header = tar::Header::new_gnu();
        header.set_path("All.csv").unwrap();
        header.set_size(1 << 44);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        let mut archive = header.as_bytes().to_vec();
        archive.extend_from_slice(&[b'x'; 512]);

        let runtime = Arc::new(FakeRuntime::new().with_archive(archive));
        let job = job();

        let err = fx
            .lifecycle
            .scrape(runtime.clone(), &job, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.step, LifecycleStep::Extract);
        assert!(fx.storage.is_empty().await);
        assert!(!fx.output.path().join(job.artifact_file_name()).exists());
        assert_eq!(runtime.removals(), 1);
    }
}
