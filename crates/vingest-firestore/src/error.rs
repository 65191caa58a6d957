//! Firestore and job store error types.

use thiserror::Error;
use vingest_models::{JobId, TransitionError};

/// Result type for Firestore operations.
pub type FirestoreResult<T> = Result<T, FirestoreError>;

/// Errors that can occur during Firestore operations.
#[derive(Debug, Error)]
pub enum FirestoreError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
}

/// Default backoff when Firestore rate-limits without saying for how long.
const DEFAULT_RATE_LIMIT_MS: u64 = 1000;

impl FirestoreError {
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map an HTTP error status to an error variant.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::AuthError(message),
            403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            409 => Self::AlreadyExists(message),
            412 => Self::PreconditionFailed(message),
            429 => Self::RateLimited(DEFAULT_RATE_LIMIT_MS),
            500..=599 => Self::ServerError(status, message),
            _ => Self::RequestFailed(message),
        }
    }

    /// HTTP status this error corresponds to, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::AuthError(_) => Some(401),
            Self::PermissionDenied(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::AlreadyExists(_) => Some(409),
            Self::PreconditionFailed(_) => Some(412),
            Self::RateLimited(_) => Some(429),
            Self::ServerError(status, _) => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Server-requested backoff, when known.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FirestoreError::Network(_) | FirestoreError::RateLimited(_) | FirestoreError::ServerError(..)
        )
    }

    /// True if the error was caused by a failed precondition (e.g., updateTime mismatch).
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, FirestoreError::PreconditionFailed(_))
            || matches!(
                self,
                FirestoreError::RequestFailed(msg)
                if msg.contains("FAILED_PRECONDITION")
            )
    }
}

/// Result type for job store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by a [`JobStore`](crate::JobStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job already exists: {0}")]
    AlreadyExists(JobId),

    #[error("Job {0} was modified concurrently")]
    Conflict(JobId),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Stored job is malformed: {0}")]
    Malformed(String),

    #[error(transparent)]
    Firestore(#[from] FirestoreError),
}

impl StoreError {
    /// Whether repeating the same write could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Conflict(_) => true,
            StoreError::Firestore(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        assert!(matches!(FirestoreError::from_http_status(429, "x"), FirestoreError::RateLimited(_)));
        assert!(matches!(FirestoreError::from_http_status(503, "x"), FirestoreError::ServerError(503, _)));
        assert!(matches!(FirestoreError::from_http_status(404, "x"), FirestoreError::NotFound(_)));
        assert!(matches!(FirestoreError::from_http_status(409, "x"), FirestoreError::AlreadyExists(_)));
        assert!(matches!(FirestoreError::from_http_status(400, "x"), FirestoreError::RequestFailed(_)));
    }

    #[test]
    fn test_retryability() {
        assert!(FirestoreError::from_http_status(500, "x").is_retryable());
        assert!(FirestoreError::RateLimited(10).is_retryable());
        assert!(!FirestoreError::from_http_status(400, "x").is_retryable());
        assert!(!FirestoreError::from_http_status(403, "x").is_retryable());
    }

    #[test]
    fn test_http_status_getter() {
        assert_eq!(FirestoreError::RateLimited(1000).http_status(), Some(429));
        assert_eq!(FirestoreError::ServerError(502, "bad gateway".into()).http_status(), Some(502));
        assert_eq!(FirestoreError::invalid_response("x").http_status(), None);
        assert_eq!(FirestoreError::RateLimited(250).retry_after_ms(), Some(250));
    }

    #[test]
    fn test_precondition_detection() {
        assert!(FirestoreError::from_http_status(412, "x").is_precondition_failed());
        assert!(FirestoreError::request_failed("FAILED_PRECONDITION: stale").is_precondition_failed());
    }
}
