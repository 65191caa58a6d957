//! Download orchestrator.
//!
//! Runs one job from its initial status to `ready_for_analysis` or `error`:
//!
//! 1. `pending_download` / `uploaded` -> `processing`
//! 2. acquire the video into a job-scoped workspace (download with bounded
//!    transient retries, or check, import and probe an uploaded file)
//! 3. upload the file and its metadata sidecar to object storage
//! 4. `processing` -> `ready_for_analysis`
//!
//! Any terminal failure is classified and persisted as `error` before it is
//! returned to the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn, Instrument};
use vingest_media::{
    check_upload_extension, classify, classify_error, file_size, probe_video, JobWorkspace, MediaError, WorkspaceRoot,
};
use vingest_metadata::fallback_metadata;
use vingest_models::{
    ErrorKind, JobId, JobStatus, SourceReference, StatusUpdate, VideoAcquisitionJob, VideoId, VideoMetadata,
};
use vingest_storage::StorageUploader;

use crate::acquirer::Acquirer;
use crate::error::{AcquisitionFailure, WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::retry::{retry_transient, BackoffPolicy};
use crate::state_machine::JobStateMachine;

/// A video sitting in its job workspace, ready for upload.
#[derive(Debug)]
pub struct Acquired {
    pub workspace: JobWorkspace,
    pub local_path: PathBuf,
    pub metadata: VideoMetadata,
    pub video_id: VideoId,
    pub retries: u32,
}

/// Result of a job that reached `ready_for_analysis`.
#[derive(Debug, Clone, PartialEq)]
pub struct Completed {
    pub job_id: JobId,
    pub video_id: VideoId,
    pub storage_reference: String,
    pub retries: u32,
}

pub struct Orchestrator {
    acquirer: Arc<dyn Acquirer>,
    uploader: StorageUploader,
    state: JobStateMachine,
    workspaces: WorkspaceRoot,
    backoff: BackoffPolicy,
    attempt_timeout: Duration,
    max_file_size: u64,
}

impl Orchestrator {
    pub fn new(
        acquirer: Arc<dyn Acquirer>,
        uploader: StorageUploader,
        state: JobStateMachine,
        workspaces: WorkspaceRoot,
    ) -> Self {
        Self {
            acquirer,
            uploader,
            state,
            workspaces,
            backoff: BackoffPolicy::default(),
            attempt_timeout: Duration::from_secs(600),
            max_file_size: 500 * 1024 * 1024,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Largest uploaded file accepted, in bytes.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn state(&self) -> &JobStateMachine {
        &self.state
    }

    pub fn acquirer(&self) -> &Arc<dyn Acquirer> {
        &self.acquirer
    }

    /// Acquire the video behind `source` into a fresh workspace.
    ///
    /// On failure the job is moved to `error` before this returns.
    pub async fn acquire(&self, job_id: &JobId, source: &SourceReference) -> Result<Acquired, AcquisitionFailure> {
        match source {
            SourceReference::Url { url } => self.acquire_url(job_id, url).await,
            SourceReference::Upload { path, original_name } => {
                self.acquire_upload(job_id, Path::new(path), original_name.as_deref())
                    .await
            }
        }
    }

    async fn acquire_url(&self, job_id: &JobId, url: &str) -> Result<Acquired, AcquisitionFailure> {
        let video_id = match self.acquirer.resolve_video_id(url) {
            Ok(id) => id,
            Err(e) => {
                let detail = format!("{} ({})", e, url);
                return Err(self.fail(job_id, AcquisitionFailure::new(ErrorKind::InvalidUrl, &detail, 0)).await);
            }
        };

        let workspace = match self.workspaces.create(job_id.as_str()).await {
            Ok(ws) => ws,
            Err(e) => return Err(self.fail(job_id, media_failure(&e, 0)).await),
        };

        let acquirer = &self.acquirer;
        let timeout = self.attempt_timeout;
        let ws = &workspace;
        let vid = &video_id;

        let outcome = retry_transient(
            &self.backoff,
            "acquire",
            move |attempt| async move {
                debug!(video_id = %vid, attempt, mode = %acquirer.mode(), "Acquisition attempt");
                match tokio::time::timeout(timeout, acquirer.fetch(vid, ws)).await {
                    Ok(result) => result,
                    Err(_) => Err(MediaError::Timeout(timeout.as_secs())),
                }
            },
            |e: &MediaError| classify_error(e).is_transient(),
        )
        .await;

        let (local_path, retries) = match outcome {
            Ok(done) => done,
            Err(exhausted) => {
                let failure = media_failure(&exhausted.error, exhausted.retries);
                release(workspace);
                return Err(self.fail(job_id, failure).await);
            }
        };
        metrics::record_retries(retries);

        let mut metadata = self.acquirer.metadata(&video_id).await;
        if let Ok(size) = file_size(&local_path).await {
            metadata = metadata.with_file_size(size);
        }

        Ok(Acquired {
            workspace,
            local_path,
            metadata,
            video_id,
            retries,
        })
    }

    async fn acquire_upload(
        &self,
        job_id: &JobId,
        path: &Path,
        original_name: Option<&str>,
    ) -> Result<Acquired, AcquisitionFailure> {
        let name = original_name
            .map(str::to_string)
            .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "upload.mp4".to_string());
        let ext = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .unwrap_or("mp4")
            .to_ascii_lowercase();

        if let Err(e) = check_upload_extension(&ext) {
            return Err(self.fail(job_id, media_failure(&e, 0)).await);
        }
        // A missing file is reported by the import below
        if let Ok(size) = file_size(path).await {
            if size > self.max_file_size {
                let e = MediaError::FileTooLarge {
                    size,
                    limit: self.max_file_size,
                };
                return Err(self.fail(job_id, media_failure(&e, 0)).await);
            }
        }

        let workspace = match self.workspaces.create(job_id.as_str()).await {
            Ok(ws) => ws,
            Err(e) => return Err(self.fail(job_id, media_failure(&e, 0)).await),
        };

        let local_path = match workspace.import(path, &format!("source.{}", ext)).await {
            Ok(p) => p,
            Err(e) => {
                let failure = media_failure(&e, 0);
                release(workspace);
                return Err(self.fail(job_id, failure).await);
            }
        };

        // Uploads have no platform id; the job id stands in for it
        let video_id = VideoId::from(job_id.as_str());
        let title = Path::new(&name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());

        let metadata = match probe_video(&local_path).await {
            Ok(info) => info.to_metadata(title),
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Probe failed, using fallback metadata");
                let mut metadata = fallback_metadata(video_id.as_str());
                metadata.title = title;
                match file_size(&local_path).await {
                    Ok(size) => metadata.with_file_size(size),
                    Err(_) => metadata,
                }
            }
        };

        Ok(Acquired {
            workspace,
            local_path,
            metadata,
            video_id,
            retries: 0,
        })
    }

    /// Persist `failure` on the job, then hand it back.
    ///
    /// A failed write is logged and attached to the failure; the
    /// classification itself is never replaced.
    async fn fail(&self, job_id: &JobId, mut failure: AcquisitionFailure) -> AcquisitionFailure {
        metrics::record_failure(failure.kind);
        metrics::record_retries(failure.retries);

        let update = StatusUpdate::error(failure.kind, failure.message.clone()).with_retry_count(failure.retries);
        if let Err(e) = self.state.transition(job_id, update).await {
            error!(
                job_id = %job_id,
                kind = %failure.kind,
                error = %e,
                "Failed to persist acquisition failure"
            );
            failure.persistence_error = Some(e.to_string());
        }
        failure
    }

    /// Run the full pipeline for `job`.
    pub async fn process(&self, job: &VideoAcquisitionJob) -> WorkerResult<Completed> {
        let logger = JobLogger::new(&job.id, "acquire");
        let span = logger.create_span();
        let started = Instant::now();

        metrics::job_started();
        let result = self.run(job, &logger).instrument(span).await;
        metrics::job_finished();

        let outcome = if result.is_ok() { "ready" } else { "error" };
        metrics::record_job(outcome, self.acquirer.mode(), started.elapsed().as_secs_f64());
        result
    }

    async fn run(&self, job: &VideoAcquisitionJob, logger: &JobLogger) -> WorkerResult<Completed> {
        let expected = job.source_reference.initial_status();
        if job.status != expected && job.status != JobStatus::Processing {
            return Err(WorkerError::InvalidState {
                job_id: job.id.clone(),
                status: job.status,
                expected,
            });
        }

        logger.log_start(&format!("{} ({})", job.source_reference, self.acquirer.mode()));
        self.state.transition(&job.id, StatusUpdate::processing()).await?;

        let Acquired {
            workspace,
            local_path,
            metadata,
            video_id,
            retries,
        } = match self.acquire(&job.id, &job.source_reference).await {
            Ok(acquired) => acquired,
            Err(failure) => {
                logger.log_error(&failure.to_string());
                return Err(failure.into());
            }
        };
        logger.log_progress(&format!("acquired {} after {} retries", video_id, retries));

        let storage_reference = match self.uploader.upload(&job.id, &local_path, &metadata).await {
            Ok(reference) => reference,
            Err(e) => {
                let detail = e.to_string();
                let failure = AcquisitionFailure::new(classify(&detail), &detail, retries);
                release(workspace);
                let failure = self.fail(&job.id, failure).await;
                logger.log_error(&failure.to_string());
                return Err(failure.into());
            }
        };
        release(workspace);

        let update = StatusUpdate::ready(metadata, storage_reference.clone())
            .with_video_id(video_id.clone())
            .with_retry_count(retries);
        self.state.transition(&job.id, update).await?;

        logger.log_completion(&storage_reference);
        Ok(Completed {
            job_id: job.id.clone(),
            video_id,
            storage_reference,
            retries,
        })
    }

    /// Re-run a job that ended in `error`.
    pub async fn retry_job(&self, job_id: &JobId) -> WorkerResult<Completed> {
        let job = self.state.get(job_id).await?;
        if job.status != JobStatus::Error {
            return Err(WorkerError::InvalidState {
                job_id: job_id.clone(),
                status: job.status,
                expected: JobStatus::Error,
            });
        }

        let target = job.source_reference.retry_status();
        info!(job_id = %job_id, previous_error = ?job.error_kind, to = %target, "Retrying job");
        self.state.transition(job_id, StatusUpdate::to(target)).await?;

        let job = self.state.get(job_id).await?;
        self.process(&job).await
    }
}

fn media_failure(err: &MediaError, retries: u32) -> AcquisitionFailure {
    let detail = match err {
        MediaError::DownloadFailed { message } => message.clone(),
        other => other.to_string(),
    };
    AcquisitionFailure::new(classify_error(err), &detail, retries)
}

fn release(workspace: JobWorkspace) {
    if let Err(e) = workspace.close() {
        warn!(error = %e, "Failed to remove job workspace");
    }
}
