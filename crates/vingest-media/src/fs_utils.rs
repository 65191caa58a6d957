//! Job-scoped temporary workspaces.
//!
//! Every job gets its own directory under the worker's work dir, named after
//! the job id. The directory is removed exactly once: explicitly through
//! [`JobWorkspace::close`] on normal paths, or by `Drop` on early returns,
//! errors and panics.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Parent directory for job workspaces.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    root: PathBuf,
    active: Arc<AtomicUsize>,
}

impl WorkspaceRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Number of workspaces created and not yet released.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Create a fresh workspace for `job_id`.
    pub async fn create(&self, job_id: &str) -> MediaResult<JobWorkspace> {
        tokio::fs::create_dir_all(&self.root).await?;

        let prefix = format!("{}-", sanitize(job_id));
        let root = self.root.clone();
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(&prefix).tempdir_in(root)
        })
        .await
        .map_err(|e| MediaError::internal(format!("workspace task failed: {}", e)))??;

        self.active.fetch_add(1, Ordering::SeqCst);
        metrics::gauge!("vingest_workspaces_active").increment(1.0);
        debug!(job_id = %job_id, path = %dir.path().display(), "Created job workspace");

        Ok(JobWorkspace {
            path: dir.path().to_path_buf(),
            dir: Some(dir),
            active: Arc::clone(&self.active),
        })
    }
}

/// Temporary directory owned by one job.
#[derive(Debug)]
pub struct JobWorkspace {
    path: PathBuf,
    dir: Option<TempDir>,
    active: Arc<AtomicUsize>,
}

impl JobWorkspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file inside the workspace.
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Copy an external file into the workspace.
    pub async fn import(&self, src: impl AsRef<Path>, name: &str) -> MediaResult<PathBuf> {
        let src = src.as_ref();
        if !src.exists() {
            return Err(MediaError::FileNotFound(src.to_path_buf()));
        }
        let dst = self.file_path(name);
        tokio::fs::copy(src, &dst).await?;
        Ok(dst)
    }

    /// Remove the workspace now, reporting any removal error.
    pub fn close(mut self) -> MediaResult<()> {
        self.release()
    }

    fn release(&mut self) -> MediaResult<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        metrics::gauge!("vingest_workspaces_active").decrement(1.0);
        debug!(path = %self.path.display(), "Releasing job workspace");
        dir.close()?;
        Ok(())
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(path = %self.path.display(), error = %e, "Failed to remove job workspace");
        }
    }
}

/// Containers accepted for uploaded files, lower-case.
pub const UPLOAD_EXTENSIONS: &[&str] = &["mp4", "m4v", "mpeg", "mpg", "mov", "avi", "webm", "mkv"];

/// Reject uploads whose extension is not an accepted video container.
pub fn check_upload_extension(ext: &str) -> MediaResult<()> {
    let lower = ext.to_ascii_lowercase();
    if UPLOAD_EXTENSIONS.contains(&lower.as_str()) {
        Ok(())
    } else {
        Err(MediaError::UnsupportedFileType(format!(
            "'{}' (allowed: {})",
            ext,
            UPLOAD_EXTENSIONS.join(", ")
        )))
    }
}

/// Size of a file in bytes.
pub async fn file_size(path: impl AsRef<Path>) -> MediaResult<u64> {
    Ok(tokio::fs::metadata(path.as_ref()).await?.len())
}

fn sanitize(job_id: &str) -> String {
    job_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
