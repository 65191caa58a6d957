//! Video acquisition job entity.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{ErrorKind, JobStatus, VideoId, VideoMetadata};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the caller handed us to acquire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceReference {
    /// Shared video-platform URL (or bare id)
    Url { url: String },
    /// File already uploaded to local disk
    Upload {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        original_name: Option<String>,
    },
}

impl SourceReference {
    pub fn url(url: impl Into<String>) -> Self {
        SourceReference::Url { url: url.into() }
    }

    pub fn upload(path: impl Into<String>, original_name: Option<String>) -> Self {
        SourceReference::Upload {
            path: path.into(),
            original_name,
        }
    }

    /// Status a fresh job for this reference starts in.
    pub fn initial_status(&self) -> JobStatus {
        match self {
            SourceReference::Url { .. } => JobStatus::PendingDownload,
            SourceReference::Upload { .. } => JobStatus::Uploaded,
        }
    }

    /// Status a retried job re-enters.
    pub fn retry_status(&self) -> JobStatus {
        match self {
            SourceReference::Url { .. } => JobStatus::PendingDownload,
            SourceReference::Upload { .. } => JobStatus::Processing,
        }
    }

    /// Raw reference string (URL or file path).
    pub fn as_str(&self) -> &str {
        match self {
            SourceReference::Url { url } => url,
            SourceReference::Upload { path, .. } => path,
        }
    }
}

impl fmt::Display for SourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceReference::Url { url } => write!(f, "url:{}", url),
            SourceReference::Upload { path, .. } => write!(f, "upload:{}", path),
        }
    }
}

/// One attempt to acquire and store a single video asset.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoAcquisitionJob {
    /// Unique job ID
    pub id: JobId,

    /// Original reference supplied by the caller
    pub source_reference: SourceReference,

    /// Current lifecycle status
    pub status: JobStatus,

    /// Resolved platform id, once known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<VideoId>,

    /// Set together with `storage_reference` when the job becomes ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VideoMetadata>,

    /// Public reference of the stored asset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_reference: Option<String>,

    /// Human-readable failure, present only in `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    /// Retries spent by the most recent attempt
    #[serde(default)]
    pub retry_count: u32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl VideoAcquisitionJob {
    /// Create a new job in the initial status for its source.
    pub fn new(source_reference: SourceReference) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            status: source_reference.initial_status(),
            source_reference,
            video_id: None,
            metadata: None,
            storage_reference: None,
            error_message: None,
            error_kind: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a job for a shared URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self::new(SourceReference::url(url))
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a status update in place.
    ///
    /// Repeating the current status is a no-op. Any other update must be a
    /// legal edge of the status graph and carry exactly the fields its
    /// target status requires.
    pub fn apply(&mut self, update: &StatusUpdate) -> Result<TransitionOutcome, TransitionError> {
        if self.status == update.status {
            return Ok(TransitionOutcome::Unchanged);
        }
        update.validate_from(self.status)?;

        self.status = update.status;
        if let Some(video_id) = &update.video_id {
            self.video_id = Some(video_id.clone());
        }
        if let Some(retry_count) = update.retry_count {
            self.retry_count = retry_count;
        }

        match update.status {
            JobStatus::ReadyForAnalysis => {
                self.metadata = update.metadata.clone();
                self.storage_reference = update.storage_reference.clone();
                self.error_message = None;
                self.error_kind = None;
            }
            JobStatus::Error => {
                self.error_message = update.error_message.clone();
                self.error_kind = update.error_kind;
            }
            _ => {
                self.error_message = None;
                self.error_kind = None;
            }
        }

        self.updated_at = Utc::now();
        Ok(TransitionOutcome::Applied)
    }
}

/// Fields written together with a status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<VideoId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VideoMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

impl StatusUpdate {
    /// Bare status change with no extra fields.
    pub fn to(status: JobStatus) -> Self {
        Self {
            status,
            video_id: None,
            metadata: None,
            storage_reference: None,
            error_message: None,
            error_kind: None,
            retry_count: None,
        }
    }

    pub fn processing() -> Self {
        Self::to(JobStatus::Processing)
    }

    pub fn ready(metadata: VideoMetadata, storage_reference: impl Into<String>) -> Self {
        Self {
            metadata: Some(metadata),
            storage_reference: Some(storage_reference.into()),
            ..Self::to(JobStatus::ReadyForAnalysis)
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            error_kind: Some(kind),
            ..Self::to(JobStatus::Error)
        }
    }

    pub fn with_video_id(mut self, video_id: VideoId) -> Self {
        self.video_id = Some(video_id);
        self
    }

    pub fn with_retry_count(mut self, retries: u32) -> Self {
        self.retry_count = Some(retries);
        self
    }

    /// Check this update is a legal successor of `current`.
    pub fn validate_from(&self, current: JobStatus) -> Result<(), TransitionError> {
        if !current.can_transition_to(self.status) {
            return Err(TransitionError::InvalidTransition {
                from: current,
                to: self.status,
            });
        }
        self.validate_fields()
    }

    fn validate_fields(&self) -> Result<(), TransitionError> {
        let ready = self.status == JobStatus::ReadyForAnalysis;
        let error = self.status == JobStatus::Error;

        if ready && self.metadata.is_none() {
            return Err(TransitionError::missing(self.status, "metadata"));
        }
        if ready && self.storage_reference.is_none() {
            return Err(TransitionError::missing(self.status, "storage_reference"));
        }
        if !ready && (self.metadata.is_some() || self.storage_reference.is_some()) {
            return Err(TransitionError::unexpected(self.status, "metadata/storage_reference"));
        }
        if error && self.error_message.as_deref().map_or(true, |m| m.trim().is_empty()) {
            return Err(TransitionError::missing(self.status, "error_message"));
        }
        if !error && self.error_message.is_some() {
            return Err(TransitionError::unexpected(self.status, "error_message"));
        }
        Ok(())
    }
}

/// Result of applying a [`StatusUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The job moved to the new status
    Applied,
    /// The job was already in the requested status
    Unchanged,
}

/// Rejected status update.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Illegal transition {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Status {status} requires {field}")]
    MissingField { status: JobStatus, field: &'static str },

    #[error("Status {status} must not carry {field}")]
    UnexpectedField { status: JobStatus, field: &'static str },
}

impl TransitionError {
    fn missing(status: JobStatus, field: &'static str) -> Self {
        Self::MissingField { status, field }
    }

    fn unexpected(status: JobStatus, field: &'static str) -> Self {
        Self::UnexpectedField { status, field }
    }
}
