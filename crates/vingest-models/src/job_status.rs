//! Acquisition job status graph.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`VideoAcquisitionJob`](crate::VideoAcquisitionJob).
///
/// ```text
/// pending_download ─┐
///                   ├─> processing ─> ready_for_analysis
/// uploaded ─────────┘        │
///        └──────────┬────────┘
///                   v
///                 error ─> pending_download | processing   (retry)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Remote reference accepted, bytes not yet fetched
    #[default]
    PendingDownload,
    /// Local file handed over by the caller
    Uploaded,
    /// Bytes are being acquired, probed or uploaded
    Processing,
    /// Asset stored and metadata resolved
    ReadyForAnalysis,
    /// Attempt failed; see the job's error message
    Error,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::PendingDownload => "pending_download",
            JobStatus::Uploaded => "uploaded",
            JobStatus::Processing => "processing",
            JobStatus::ReadyForAnalysis => "ready_for_analysis",
            JobStatus::Error => "error",
        }
    }

    /// Parse the representation produced by [`JobStatus::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_download" => Some(JobStatus::PendingDownload),
            "uploaded" => Some(JobStatus::Uploaded),
            "processing" => Some(JobStatus::Processing),
            "ready_for_analysis" => Some(JobStatus::ReadyForAnalysis),
            "error" => Some(JobStatus::Error),
            _ => None,
        }
    }

    /// Check if this is a terminal state for the current attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::ReadyForAnalysis | JobStatus::Error)
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// Self-transitions are not edges of the graph; callers treat them as no-ops.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (PendingDownload, Processing)
                | (Uploaded, Processing)
                | (Processing, ReadyForAnalysis)
                | (PendingDownload, Error)
                | (Uploaded, Error)
                | (Processing, Error)
                | (Error, PendingDownload)
                | (Error, Processing)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
