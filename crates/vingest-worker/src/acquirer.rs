//! Mock and real acquisition strategies.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use vingest_media::{file_size, JobWorkspace, MediaError, MediaResult, RealAcquisitionExecutor};
use vingest_metadata::MetadataResolver;
use vingest_models::{resolve_video_id, resolve_video_id_or_fallback, VideoId, VideoMetadata, YoutubeIdError};

use crate::strategy::AcquisitionMode;

/// One acquisition strategy.
#[async_trait]
pub trait Acquirer: Send + Sync {
    fn mode(&self) -> AcquisitionMode;

    /// Canonical video id for a source reference.
    fn resolve_video_id(&self, reference: &str) -> Result<VideoId, YoutubeIdError>;

    /// Produce the video file inside `workspace`.
    async fn fetch(&self, video_id: &VideoId, workspace: &JobWorkspace) -> MediaResult<PathBuf>;

    /// Metadata record for `video_id`.
    async fn metadata(&self, video_id: &VideoId) -> VideoMetadata;
}

/// Writes a placeholder file and deterministic metadata.
#[derive(Clone, Default)]
pub struct MockAcquirer {
    resolver: MetadataResolver,
}

impl MockAcquirer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Acquirer for MockAcquirer {
    fn mode(&self) -> AcquisitionMode {
        AcquisitionMode::Mock
    }

    fn resolve_video_id(&self, reference: &str) -> Result<VideoId, YoutubeIdError> {
        Ok(VideoId::from(resolve_video_id_or_fallback(Some(reference))))
    }

    async fn fetch(&self, video_id: &VideoId, workspace: &JobWorkspace) -> MediaResult<PathBuf> {
        let path = workspace.file_path(&format!("{}.mp4", video_id));
        let content = format!(
            "Mock video file for {}\nPlaceholder for actual video content.\n",
            video_id
        );
        tokio::fs::write(&path, content).await?;
        debug!(video_id = %video_id, path = %path.display(), "Wrote placeholder video");
        Ok(path)
    }

    async fn metadata(&self, video_id: &VideoId) -> VideoMetadata {
        self.resolver.fallback(video_id)
    }
}

/// Fetches real bytes through an executor.
pub struct RealAcquirer {
    executor: Arc<dyn RealAcquisitionExecutor>,
    resolver: MetadataResolver,
    max_file_size: u64,
    mode: AcquisitionMode,
}

impl RealAcquirer {
    pub fn new(
        executor: Arc<dyn RealAcquisitionExecutor>,
        resolver: MetadataResolver,
        max_file_size: u64,
        mode: AcquisitionMode,
    ) -> Self {
        Self {
            executor,
            resolver,
            max_file_size,
            mode,
        }
    }
}

#[async_trait]
impl Acquirer for RealAcquirer {
    fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    fn resolve_video_id(&self, reference: &str) -> Result<VideoId, YoutubeIdError> {
        resolve_video_id(reference).map(VideoId::from)
    }

    async fn fetch(&self, video_id: &VideoId, workspace: &JobWorkspace) -> MediaResult<PathBuf> {
        let path = self.executor.download(video_id, workspace.path()).await?;

        let size = file_size(&path).await?;
        if size > self.max_file_size {
            warn!(
                video_id = %video_id,
                size,
                limit = self.max_file_size,
                "Acquired file exceeds size limit"
            );
            return Err(MediaError::FileTooLarge {
                size,
                limit: self.max_file_size,
            });
        }

        info!(video_id = %video_id, executor = self.executor.name(), size, "Acquired video");
        Ok(path)
    }

    async fn metadata(&self, video_id: &VideoId) -> VideoMetadata {
        self.resolver.resolve(video_id).await
    }
}

/// Executor standing in for a remote host that was never configured.
pub struct UnavailableExecutor {
    reason: String,
}

impl UnavailableExecutor {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl RealAcquisitionExecutor for UnavailableExecutor {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn download(&self, _video_id: &VideoId, _dest_dir: &std::path::Path) -> MediaResult<PathBuf> {
        Err(MediaError::executor_unavailable(self.reason.clone()))
    }
}
