//! Acquisition error taxonomy.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed classification of an acquisition failure.
///
/// This is the retry/fatal switch for the download orchestrator: only
/// [`ErrorKind::NetworkError`] is retried, every other kind fails the
/// attempt immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Video is private
    PrivateVideo,
    /// Video was removed or never existed
    VideoUnavailable,
    /// Video is blocked in the server's region
    Geoblocked,
    /// Downloaded artifact exceeds the configured size limit
    FileTooLarge,
    /// Upstream quota or rate limit hit
    QuotaExceeded,
    /// Transient network failure
    NetworkError,
    /// No acquisition executor is reachable
    DownloaderNotAvailable,
    /// Source reference cannot be resolved to a video
    InvalidUrl,
    /// Uploaded file is not an accepted video container
    InvalidFileType,
    /// Anything the classifier does not recognise
    UnknownError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::PrivateVideo,
        ErrorKind::VideoUnavailable,
        ErrorKind::Geoblocked,
        ErrorKind::FileTooLarge,
        ErrorKind::QuotaExceeded,
        ErrorKind::NetworkError,
        ErrorKind::DownloaderNotAvailable,
        ErrorKind::InvalidUrl,
        ErrorKind::InvalidFileType,
        ErrorKind::UnknownError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PrivateVideo => "PRIVATE_VIDEO",
            ErrorKind::VideoUnavailable => "VIDEO_UNAVAILABLE",
            ErrorKind::Geoblocked => "GEOBLOCKED",
            ErrorKind::FileTooLarge => "FILE_TOO_LARGE",
            ErrorKind::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::DownloaderNotAvailable => "DOWNLOADER_NOT_AVAILABLE",
            ErrorKind::InvalidUrl => "INVALID_URL",
            ErrorKind::InvalidFileType => "INVALID_FILE_TYPE",
            ErrorKind::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Parse the wire representation produced by [`ErrorKind::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Whether a failure of this kind may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::NetworkError)
    }

    /// Message safe to show to the job owner.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::PrivateVideo => "This video is private and cannot be downloaded",
            ErrorKind::VideoUnavailable => "This video is unavailable or has been removed",
            ErrorKind::Geoblocked => "This video is blocked in the server's region",
            ErrorKind::FileTooLarge => "Video file exceeds the maximum allowed size",
            ErrorKind::QuotaExceeded => "Download quota exceeded, try again later",
            ErrorKind::NetworkError => "Network error while downloading the video",
            ErrorKind::DownloaderNotAvailable => "Video downloader is not available",
            ErrorKind::InvalidUrl => "Invalid or unsupported video URL",
            ErrorKind::InvalidFileType => "Uploaded file is not a supported video type",
            ErrorKind::UnknownError => "Video download failed",
        }
    }

    /// Build the message persisted on the job for this kind.
    pub fn describe(&self, detail: &str) -> String {
        let detail = detail.trim();
        if detail.is_empty() {
            self.user_message().to_string()
        } else {
            format!("{}: {}", self.user_message(), detail)
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_error_is_transient() {
        for kind in ErrorKind::ALL {
            assert_eq!(kind.is_transient(), kind == ErrorKind::NetworkError, "{kind}");
        }
    }

    #[test]
    fn test_as_str_matches_serde() {
        for kind in ErrorKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(ErrorKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ErrorKind::parse("nope"), None);
    }

    #[test]
    fn test_describe() {
        let msg = ErrorKind::PrivateVideo.describe("ERROR: Private video. Sign in");
        assert!(msg.starts_with("This video is private"));
        assert!(msg.ends_with("Sign in"));
        assert_eq!(ErrorKind::UnknownError.describe("  "), "Video download failed");
    }
}
