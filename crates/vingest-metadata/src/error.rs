//! Metadata error types.

use thiserror::Error;

/// Result type for metadata lookups.
pub type MetadataResult<T> = Result<T, MetadataError>;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("No API key configured")]
    Unauthenticated,

    #[error("Invalid video id: {0}")]
    InvalidVideoId(String),

    #[error("Video not found: {0}")]
    NotFound(String),

    #[error("API quota exceeded or key rejected: {0}")]
    QuotaExceeded(String),

    #[error("API request failed ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed API response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl MetadataError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map a non-success API status to an error.
    pub fn from_status(status: u16, video_id: &str, body: impl Into<String>) -> Self {
        match status {
            400 => Self::InvalidVideoId(video_id.to_string()),
            403 => Self::QuotaExceeded(body.into()),
            404 => Self::NotFound(video_id.to_string()),
            _ => Self::Api {
                status,
                message: body.into(),
            },
        }
    }

    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidVideoId(_) => "invalid_id",
            Self::NotFound(_) => "not_found",
            Self::QuotaExceeded(_) => "quota",
            Self::Api { .. } => "api_error",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Http(_) => "http",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(MetadataError::from_status(400, "x", ""), MetadataError::InvalidVideoId(_)));
        assert!(matches!(MetadataError::from_status(403, "x", "quota"), MetadataError::QuotaExceeded(_)));
        assert!(matches!(MetadataError::from_status(404, "x", ""), MetadataError::NotFound(_)));
        assert!(matches!(
            MetadataError::from_status(500, "x", "boom"),
            MetadataError::Api { status: 500, .. }
        ));
        assert_eq!(MetadataError::Unauthenticated.reason(), "unauthenticated");
    }
}
