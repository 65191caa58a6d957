//! End-to-end acquisition scenarios against in-memory backends.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use vingest_firestore::{InMemoryJobStore, JobStore};
use vingest_media::{MediaError, MediaResult, RealAcquisitionExecutor, WorkspaceRoot};
use vingest_metadata::MetadataResolver;
use vingest_models::{ErrorKind, JobStatus, MetadataSource, SourceReference, VideoId, FALLBACK_VIDEO_ID};
use vingest_storage::{
    LocalObjectStorage, LocalStorageConfig, ObjectStorage, StorageError, StorageResult, StorageUploader,
};
use vingest_worker::{
    Acquirer, AcquisitionMode, BackoffPolicy, ExecutorKind, JobStateMachine, MockAcquirer, Orchestrator,
    RealAcquirer,
};

/// Executor that replays a fixed script of outcomes.
struct ScriptedExecutor {
    script: Mutex<VecDeque<Result<(), String>>>,
    calls: AtomicU32,
    /// Store to knock over on the first call
    break_store: Option<Arc<InMemoryJobStore>>,
}

impl ScriptedExecutor {
    fn new(script: Vec<Result<(), &str>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().map(|r| r.map_err(str::to_string)).collect()),
            calls: AtomicU32::new(0),
            break_store: None,
        })
    }

    fn push(&self, outcome: Result<(), &str>) {
        self.script
            .lock()
            .unwrap()
            .push_back(outcome.map_err(str::to_string));
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RealAcquisitionExecutor for ScriptedExecutor {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn download(&self, video_id: &VideoId, dest_dir: &Path) -> MediaResult<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(store) = &self.break_store {
            store.set_fail_writes(true);
        }
        let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
        match next {
            Ok(()) => {
                let path = dest_dir.join(format!("{}.mp4", video_id));
                tokio::fs::write(&path, b"video bytes").await?;
                Ok(path)
            }
            Err(raw) => Err(MediaError::download_failed(raw)),
        }
    }
}

/// Storage backend whose writes always fail.
struct BrokenStorage;

#[async_trait]
impl ObjectStorage for BrokenStorage {
    fn backend(&self) -> &'static str {
        "broken"
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://broken.test/{}", key)
    }

    async fn put_file(&self, _key: &str, _path: &Path, _content_type: &str) -> StorageResult<String> {
        Err(StorageError::upload_failed("connection reset by peer"))
    }

    async fn put_bytes(&self, _key: &str, _data: Vec<u8>, _content_type: &str) -> StorageResult<String> {
        Err(StorageError::upload_failed("connection reset by peer"))
    }

    async fn exists(&self, _key: &str) -> StorageResult<bool> {
        Ok(false)
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Ok(())
    }
}

struct Harness {
    base: TempDir,
    store: Arc<InMemoryJobStore>,
    orchestrator: Orchestrator,
}

impl Harness {
    fn new(acquirer: Arc<dyn Acquirer>) -> Self {
        let base = TempDir::new().unwrap();
        let storage = LocalObjectStorage::new(LocalStorageConfig {
            root: base.path().join("storage"),
            public_base_url: "https://cdn.test".into(),
        });
        Self::with_storage(base, acquirer, Arc::new(storage))
    }

    fn with_storage(base: TempDir, acquirer: Arc<dyn Acquirer>, storage: Arc<dyn ObjectStorage>) -> Self {
        let store = Arc::new(InMemoryJobStore::new());
        let orchestrator = Orchestrator::new(
            acquirer,
            StorageUploader::new(storage),
            JobStateMachine::new(store.clone()),
            WorkspaceRoot::new(base.path().join("work")),
        )
        .with_backoff(BackoffPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        })
        .with_attempt_timeout(Duration::from_secs(5));

        Self {
            base,
            store,
            orchestrator,
        }
    }

    fn mock() -> Self {
        Self::new(Arc::new(MockAcquirer::new()))
    }

    fn real(executor: Arc<ScriptedExecutor>) -> Self {
        Self::new(real_acquirer(executor))
    }

    async fn submit(&self, source: SourceReference) -> vingest_models::VideoAcquisitionJob {
        let job_id = self.orchestrator.state().create(source).await.unwrap();
        self.store.get_job(&job_id).await.unwrap()
    }

    /// Job workspaces still on disk.
    fn leftover_workspaces(&self) -> usize {
        match std::fs::read_dir(self.base.path().join("work")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

fn real_acquirer(executor: Arc<ScriptedExecutor>) -> Arc<dyn Acquirer> {
    Arc::new(RealAcquirer::new(
        executor,
        MetadataResolver::fallback_only(),
        u64::MAX,
        AcquisitionMode::Real(ExecutorKind::InProcess),
    ))
}

#[tokio::test]
async fn test_short_link_in_mock_mode_reaches_ready() {
    let h = Harness::mock();
    let job = h.submit(SourceReference::url("https://youtu.be/dQw4w9WgXcQ")).await;
    assert_eq!(job.status, JobStatus::PendingDownload);

    let done = h.orchestrator.process(&job).await.unwrap();
    assert_eq!(done.video_id.as_str(), "dQw4w9WgXcQ");
    assert_eq!(done.retries, 0);
    assert!(done.storage_reference.contains(job.id.as_str()));
    assert!(done.storage_reference.ends_with(".mp4"));

    let stored = h.store.get_job(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::ReadyForAnalysis);
    assert_eq!(stored.storage_reference.as_deref(), Some(done.storage_reference.as_str()));
    assert_eq!(stored.video_id.as_ref().map(VideoId::as_str), Some("dQw4w9WgXcQ"));
    let metadata = stored.metadata.unwrap();
    assert_eq!(metadata.source, MetadataSource::Fallback);
    assert!(metadata.title.contains("dQw4w9WgXcQ"));
    assert!(stored.error_message.is_none());
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_watch_url_with_playlist_resolves_video_id() {
    let h = Harness::mock();
    let job = h
        .submit(SourceReference::url("https://youtube.com/watch?v=test123&list=abc"))
        .await;

    let done = h.orchestrator.process(&job).await.unwrap();
    assert_eq!(done.video_id.as_str(), "test123");
}

#[tokio::test]
async fn test_private_video_fails_without_retry() {
    let executor = ScriptedExecutor::new(vec![Err(
        "ERROR: [youtube] dQw4w9WgXcQ: Private video. Sign in if you've been granted access to this video",
    )]);
    let h = Harness::real(executor.clone());
    let job = h.submit(SourceReference::url("https://youtu.be/dQw4w9WgXcQ")).await;

    let err = h.orchestrator.process(&job).await.unwrap_err();
    let failure = err.acquisition().unwrap();
    assert_eq!(failure.kind, ErrorKind::PrivateVideo);
    assert_eq!(failure.retries, 0);
    assert!(failure.is_persisted());
    assert_eq!(executor.calls(), 1);

    let stored = h.store.get_job(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Error);
    assert_eq!(stored.error_kind, Some(ErrorKind::PrivateVideo));
    assert!(stored.error_message.unwrap().to_lowercase().contains("private"));
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_network_errors_are_retried_until_success() {
    let executor = ScriptedExecutor::new(vec![
        Err("Network connection failed"),
        Err("Network connection failed"),
        Ok(()),
    ]);
    let h = Harness::real(executor.clone());
    let job = h.submit(SourceReference::url("https://youtu.be/dQw4w9WgXcQ")).await;

    let done = h.orchestrator.process(&job).await.unwrap();
    assert_eq!(done.retries, 2);
    assert_eq!(executor.calls(), 3);

    let stored = h.store.get_job(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::ReadyForAnalysis);
    assert_eq!(stored.retry_count, 2);
}

#[tokio::test]
async fn test_network_errors_stop_at_attempt_cap() {
    let executor = ScriptedExecutor::new(vec![
        Err("Network connection failed"),
        Err("Network connection failed"),
        Err("Network connection failed"),
        Ok(()),
    ]);
    let h = Harness::real(executor.clone());
    let job = h.submit(SourceReference::url("https://youtu.be/dQw4w9WgXcQ")).await;

    let err = h.orchestrator.process(&job).await.unwrap_err();
    let failure = err.acquisition().unwrap();
    assert_eq!(failure.kind, ErrorKind::NetworkError);
    assert_eq!(failure.retries, 2);
    assert_eq!(executor.calls(), 3);

    let stored = h.store.get_job(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Error);
    assert_eq!(stored.retry_count, 2);
}

#[tokio::test]
async fn test_unresolvable_input_uses_fallback_id_in_mock_mode() {
    let h = Harness::mock();
    let job = h.submit(SourceReference::url("just some text")).await;

    let done = h.orchestrator.process(&job).await.unwrap();
    assert_eq!(done.video_id.as_str(), FALLBACK_VIDEO_ID);

    let stored = h.store.get_job(&job.id).await.unwrap();
    assert!(stored.is_terminal());
    assert_eq!(stored.status, JobStatus::ReadyForAnalysis);
}

#[tokio::test]
async fn test_persistence_failure_does_not_mask_classification() {
    let h = Harness::mock();
    let job = h.submit(SourceReference::url("https://youtu.be/dQw4w9WgXcQ")).await;

    // The executor takes the job store down mid-acquisition
    let executor = Arc::new(ScriptedExecutor {
        script: Mutex::new(VecDeque::from([Err(
            "Video unavailable. This video has been removed".to_string(),
        )])),
        calls: AtomicU32::new(0),
        break_store: Some(h.store.clone()),
    });
    let orchestrator = Orchestrator::new(
        real_acquirer(executor),
        StorageUploader::new(Arc::new(BrokenStorage)),
        JobStateMachine::new(h.store.clone()),
        WorkspaceRoot::new(h.base.path().join("work")),
    );

    let err = orchestrator.process(&job).await.unwrap_err();
    let failure = err.acquisition().unwrap();
    assert_eq!(failure.kind, ErrorKind::VideoUnavailable);
    assert!(failure.persistence_error.is_some());
    assert!(err.is_retryable());

    h.store.set_fail_writes(false);
    let stored = h.store.get_job(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Processing);
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_retry_job_reruns_failed_acquisition() {
    let executor = ScriptedExecutor::new(vec![Err("ERROR: This video is private")]);
    let h = Harness::real(executor.clone());
    let job = h.submit(SourceReference::url("https://youtu.be/dQw4w9WgXcQ")).await;

    assert!(h.orchestrator.process(&job).await.is_err());
    assert_eq!(h.store.get_job(&job.id).await.unwrap().status, JobStatus::Error);

    executor.push(Ok(()));
    let done = h.orchestrator.retry_job(&job.id).await.unwrap();
    assert_eq!(done.video_id.as_str(), "dQw4w9WgXcQ");

    let stored = h.store.get_job(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::ReadyForAnalysis);
    assert!(stored.error_message.is_none());
    assert!(stored.error_kind.is_none());
    assert_eq!(executor.calls(), 2);
}

#[tokio::test]
async fn test_uploaded_file_is_stored_with_its_extension() {
    let h = Harness::mock();
    let upload = h.base.path().join("incoming.mov");
    std::fs::write(&upload, b"not really a movie").unwrap();

    let job = h
        .submit(SourceReference::upload(
            upload.to_string_lossy().into_owned(),
            Some("My Clip.mov".to_string()),
        ))
        .await;
    assert_eq!(job.status, JobStatus::Uploaded);

    let done = h.orchestrator.process(&job).await.unwrap();
    assert!(done.storage_reference.ends_with(".mov"));
    assert!(done.storage_reference.contains(job.id.as_str()));

    let stored = h.store.get_job(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::ReadyForAnalysis);
    let metadata = stored.metadata.unwrap();
    assert_eq!(metadata.title, "My Clip");
    assert_eq!(metadata.file_size, Some(18));
    assert!(upload.exists());
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_missing_upload_fails_the_job() {
    let h = Harness::mock();
    let job = h
        .submit(SourceReference::upload("/nonexistent/upload.mp4", None))
        .await;

    let err = h.orchestrator.process(&job).await.unwrap_err();
    assert!(err.acquisition().is_some());
    assert_eq!(h.store.get_job(&job.id).await.unwrap().status, JobStatus::Error);
}

#[tokio::test]
async fn test_storage_failure_is_classified_and_not_retried() {
    let base = TempDir::new().unwrap();
    let h = Harness::with_storage(base, Arc::new(MockAcquirer::new()), Arc::new(BrokenStorage));
    let job = h.submit(SourceReference::url("https://youtu.be/dQw4w9WgXcQ")).await;

    let err = h.orchestrator.process(&job).await.unwrap_err();
    let failure = err.acquisition().unwrap();
    assert_eq!(failure.kind, ErrorKind::NetworkError);
    assert_eq!(failure.retries, 0);

    let stored = h.store.get_job(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Error);
    assert!(stored.error_message.unwrap().contains("connection reset by peer"));
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_non_video_upload_is_rejected() {
    let h = Harness::mock();
    let upload = h.base.path().join("notes.txt");
    std::fs::write(&upload, vec![b'x'; 1000]).unwrap();

    let job = h
        .submit(SourceReference::upload(upload.to_string_lossy().into_owned(), None))
        .await;

    let err = h.orchestrator.process(&job).await.unwrap_err();
    let failure = err.acquisition().unwrap();
    assert_eq!(failure.kind, ErrorKind::InvalidFileType);
    assert_eq!(failure.retries, 0);

    let stored = h.store.get_job(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Error);
    assert!(stored.storage_reference.is_none());
    assert!(stored.error_message.unwrap().contains("txt"));
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let mut h = Harness::mock();
    h.orchestrator = h.orchestrator.with_max_file_size(4);
    let upload = h.base.path().join("big.mp4");
    std::fs::write(&upload, vec![0u8; 1000]).unwrap();

    let job = h
        .submit(SourceReference::upload(upload.to_string_lossy().into_owned(), None))
        .await;

    let err = h.orchestrator.process(&job).await.unwrap_err();
    let failure = err.acquisition().unwrap();
    assert_eq!(failure.kind, ErrorKind::FileTooLarge);
    assert_eq!(failure.retries, 0);

    let stored = h.store.get_job(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Error);
    assert_eq!(stored.error_kind, Some(ErrorKind::FileTooLarge));
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_mock_metadata_is_identical_across_jobs() {
    let h = Harness::mock();
    let first = h.submit(SourceReference::url("https://youtu.be/dQw4w9WgXcQ")).await;
    let second = h.submit(SourceReference::url("https://youtu.be/dQw4w9WgXcQ")).await;

    h.orchestrator.process(&first).await.unwrap();
    h.orchestrator.process(&second).await.unwrap();

    let first = h.store.get_job(&first.id).await.unwrap().metadata.unwrap();
    let second = h.store.get_job(&second.id).await.unwrap().metadata.unwrap();
    assert!(first.file_size.is_some());
    assert_eq!(first, second);
}
