//! Failure classification.
//!
//! Raw failure text is matched case-insensitively against an ordered rule
//! table; the first rule with a matching pattern decides the [`ErrorKind`].
//! Nothing matching falls through to [`ErrorKind::UnknownError`].

use vingest_models::ErrorKind;

use crate::error::MediaError;

/// One row of the classification table.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRule {
    pub kind: ErrorKind,
    /// Lower-case substrings, any of which selects `kind`
    pub patterns: &'static [&'static str],
}

/// Rules in evaluation order. Earlier rows win.
pub const CLASSIFICATION_RULES: &[ClassificationRule] = &[
    ClassificationRule {
        kind: ErrorKind::PrivateVideo,
        patterns: &["private"],
    },
    ClassificationRule {
        kind: ErrorKind::Geoblocked,
        patterns: &["available in your country", "geo-restrict", "geo restrict", "geoblock", "blocked"],
    },
    ClassificationRule {
        kind: ErrorKind::VideoUnavailable,
        patterns: &[
            "video unavailable",
            "video not available",
            "video not found",
            "has been removed",
            "no longer available",
            "does not exist",
        ],
    },
    ClassificationRule {
        kind: ErrorKind::FileTooLarge,
        patterns: &["too large", "max-filesize", "larger than", "exceeds maximum"],
    },
    ClassificationRule {
        kind: ErrorKind::QuotaExceeded,
        patterns: &["quota", "too many requests", "rate limit", "http error 429"],
    },
    ClassificationRule {
        kind: ErrorKind::NetworkError,
        patterns: &[
            "network",
            "connection",
            "timed out",
            "timeout",
            "temporary failure",
            "name resolution",
            "reset by peer",
            "unable to download webpage",
        ],
    },
    ClassificationRule {
        kind: ErrorKind::InvalidUrl,
        patterns: &["invalid", "malformed", "unsupported url"],
    },
    ClassificationRule {
        kind: ErrorKind::DownloaderNotAvailable,
        patterns: &["yt-dlp not found", "youtube-dl", "downloader", "not installed"],
    },
];

/// Map raw failure text to an error kind.
pub fn classify(raw: &str) -> ErrorKind {
    let lower = raw.to_lowercase();
    CLASSIFICATION_RULES
        .iter()
        .find(|rule| rule.patterns.iter().any(|p| lower.contains(p)))
        .map(|rule| rule.kind)
        .unwrap_or(ErrorKind::UnknownError)
}

/// Classify a typed media error.
///
/// Variants that already carry their meaning skip the text table.
pub fn classify_error(err: &MediaError) -> ErrorKind {
    match err {
        MediaError::YtDlpNotFound | MediaError::ExecutorUnavailable(_) => {
            ErrorKind::DownloaderNotAvailable
        }
        MediaError::FileTooLarge { .. } => ErrorKind::FileTooLarge,
        MediaError::UnsupportedFileType(_) => ErrorKind::InvalidFileType,
        MediaError::Timeout(_) => ErrorKind::NetworkError,
        // A body cut off mid-stream surfaces as a body or decode error
        MediaError::Http(e)
            if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode() =>
        {
            ErrorKind::NetworkError
        }
        other => classify(&other.to_string()),
    }
}
