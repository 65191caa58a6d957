//! Messages carried by the acquisition stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vingest_models::JobId;

/// Run the pipeline for a freshly created job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquireVideoJob {
    pub job_id: JobId,
    pub created_at: DateTime<Utc>,
}

impl AcquireVideoJob {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            created_at: Utc::now(),
        }
    }

    /// A job is acquired at most once from the stream.
    pub fn idempotency_key(&self) -> String {
        format!("acquire:{}", self.job_id)
    }
}

/// Re-run the pipeline for a job that ended in `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryAcquisitionJob {
    pub job_id: JobId,
    pub created_at: DateTime<Utc>,
}

impl RetryAcquisitionJob {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            created_at: Utc::now(),
        }
    }

    /// Each retry request is distinct, keyed by its creation time.
    pub fn idempotency_key(&self) -> String {
        format!("retry:{}:{}", self.job_id, self.created_at.timestamp_millis())
    }
}

/// Stream payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    Acquire(AcquireVideoJob),
    Retry(RetryAcquisitionJob),
}

impl QueueJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::Acquire(j) => &j.job_id,
            QueueJob::Retry(j) => &j.job_id,
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::Acquire(j) => j.idempotency_key(),
            QueueJob::Retry(j) => j.idempotency_key(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QueueJob::Acquire(_) => "acquire",
            QueueJob::Retry(_) => "retry",
        }
    }
}
