//! Worker error types.

use std::fmt;

use thiserror::Error;
use vingest_models::{ErrorKind, JobId, JobStatus};

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Terminal outcome of an acquisition, after retries.
///
/// `message` is the text persisted on the job. When the error write itself
/// failed, `persistence_error` carries that failure so callers can tell the
/// job record may still show a non-error status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub retries: u32,
    pub persistence_error: Option<String>,
}

impl AcquisitionFailure {
    /// Failure of `kind` described by raw `detail`.
    pub fn new(kind: ErrorKind, detail: &str, retries: u32) -> Self {
        Self {
            kind,
            message: kind.describe(detail),
            retries,
            persistence_error: None,
        }
    }

    /// Whether the failure is recorded on the job.
    pub fn is_persisted(&self) -> bool {
        self.persistence_error.is_none()
    }
}

impl fmt::Display for AcquisitionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} retries): {}", self.kind, self.retries, self.message)
    }
}

impl std::error::Error for AcquisitionFailure {}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Acquisition failed: {0}")]
    Acquisition(AcquisitionFailure),

    #[error("Job store error: {0}")]
    Store(#[from] vingest_firestore::StoreError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] vingest_firestore::FirestoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] vingest_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] vingest_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] vingest_queue::QueueError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] vingest_metadata::MetadataError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Job {job_id} is {status}, expected {expected}")]
    InvalidState {
        job_id: JobId,
        status: JobStatus,
        expected: JobStatus,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AcquisitionFailure> for WorkerError {
    fn from(failure: AcquisitionFailure) -> Self {
        WorkerError::Acquisition(failure)
    }
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if error is retryable by redelivering the job.
    ///
    /// A persisted acquisition failure is final for this delivery; an
    /// unpersisted one is retried so the record eventually converges.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Acquisition(failure) => !failure.is_persisted(),
            WorkerError::Store(e) => e.is_retryable(),
            WorkerError::Firestore(e) => e.is_retryable(),
            WorkerError::Queue(e) => e.is_retryable(),
            WorkerError::Storage(_) | WorkerError::Io(_) => true,
            _ => false,
        }
    }

    /// The classified acquisition failure, if this is one.
    pub fn acquisition(&self) -> Option<&AcquisitionFailure> {
        match self {
            WorkerError::Acquisition(failure) => Some(failure),
            _ => None,
        }
    }
}
