//! Job asset layout and upload.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use vingest_models::{JobId, VideoMetadata};

use crate::error::StorageResult;
use crate::storage::ObjectStorage;

/// Key of the stored video for a job: `videos/{job_id}/{job_id}.{ext}`.
pub fn video_key(job_id: &JobId, ext: &str) -> String {
    format!("videos/{}/{}.{}", job_id, job_id, ext)
}

/// Key of the metadata sidecar for a job.
pub fn metadata_key(job_id: &JobId) -> String {
    format!("videos/{}/metadata.json", job_id)
}

/// MIME type for a video file extension.
pub fn content_type_for(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mpeg" | "mpg" => "video/mpeg",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

/// Pushes finished job assets to object storage.
#[derive(Clone)]
pub struct StorageUploader {
    storage: Arc<dyn ObjectStorage>,
}

impl StorageUploader {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    pub fn backend(&self) -> &'static str {
        self.storage.backend()
    }

    /// Upload the video at `local_path` plus a metadata sidecar.
    ///
    /// Returns the public reference of the video object.
    pub async fn upload(
        &self,
        job_id: &JobId,
        local_path: &Path,
        metadata: &VideoMetadata,
    ) -> StorageResult<String> {
        let ext = local_path
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .unwrap_or("mp4")
            .to_ascii_lowercase();

        let key = video_key(job_id, &ext);
        let public_ref = self
            .storage
            .put_file(&key, local_path, content_type_for(&ext))
            .await?;

        let sidecar = serde_json::to_vec_pretty(metadata)?;
        if let Err(e) = self
            .storage
            .put_bytes(&metadata_key(job_id), sidecar, "application/json")
            .await
        {
            if let Err(cleanup) = self.storage.delete(&key).await {
                warn!(job_id = %job_id, key = %key, error = %cleanup, "Failed to remove orphaned video object");
            }
            return Err(e);
        }

        info!(job_id = %job_id, backend = self.backend(), reference = %public_ref, "Stored video asset");
        Ok(public_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{LocalObjectStorage, LocalStorageConfig};
    use tempfile::TempDir;
    use vingest_models::MetadataSource;

    fn metadata() -> VideoMetadata {
        VideoMetadata {
            title: "Clip".into(),
            description: String::new(),
            duration_secs: 10,
            width: 640,
            height: 360,
            format: "mp4".into(),
            uploader: "me".into(),
            view_count: 0,
            like_count: 0,
            thumbnail_url: None,
            published_at: None,
            file_size: Some(5),
            is_hd: false,
            source: MetadataSource::Fallback,
        }
    }

    #[test]
    fn test_keys() {
        let id = JobId::from_string("job-1");
        assert_eq!(video_key(&id, "mp4"), "videos/job-1/job-1.mp4");
        assert_eq!(metadata_key(&id), "videos/job-1/metadata.json");
        assert_eq!(content_type_for("MOV"), "video/quicktime");
        assert_eq!(content_type_for("bin"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_upload_writes_video_and_sidecar() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(LocalObjectStorage::new(LocalStorageConfig {
            root: dir.path().join("bucket"),
            public_base_url: "https://cdn.test".into(),
        }));
        let uploader = StorageUploader::new(storage.clone());

        let src = dir.path().join("x.mp4");
        std::fs::write(&src, b"video").unwrap();
        let job_id = JobId::from_string("job-7");

        let reference = uploader.upload(&job_id, &src, &metadata()).await.unwrap();
        assert_eq!(reference, "https://cdn.test/videos/job-7/job-7.mp4");

        let sidecar = std::fs::read(storage.object_path("videos/job-7/metadata.json")).unwrap();
        let parsed: VideoMetadata = serde_json::from_slice(&sidecar).unwrap();
        assert_eq!(parsed, metadata());
    }
}
