//! Video identifier resolution from shared references.
//!
//! Accepted shapes:
//! - `https://youtube.com/watch?v=VIDEO_ID` (any position of `v` in the query)
//! - `https://youtu.be/VIDEO_ID`
//! - `https://youtube.com/embed/VIDEO_ID`, `/v/VIDEO_ID`, `/shorts/VIDEO_ID`
//! - a bare `VIDEO_ID`, optionally followed by `?`, `&` or `#` parameters
//!
//! The scheme may be omitted (`youtube.com/watch?v=...`).

use url::Url;

/// Identifier used when a reference cannot be resolved and the caller
/// prefers forward progress over failing.
pub const FALLBACK_VIDEO_ID: &str = "mock_video_id";

/// Length of a canonical platform id; bare ids must match it exactly.
const CANONICAL_ID_LEN: usize = 11;

/// Ids taken from a URL path or query are accepted up to this length.
const MAX_ID_LEN: usize = 64;

/// Errors that can occur during video ID resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum YoutubeIdError {
    #[error("No video reference supplied")]
    Empty,

    #[error("URL is not a supported video URL")]
    UnsupportedUrl,

    #[error("Video ID has invalid format")]
    InvalidVideoId,

    #[error("Video ID not found in URL")]
    VideoIdNotFound,
}

/// Result type for video ID resolution.
pub type YoutubeIdResult<T> = Result<T, YoutubeIdError>;

/// Resolve the canonical video id from a source reference.
pub fn resolve_video_id(input: &str) -> YoutubeIdResult<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(YoutubeIdError::Empty);
    }

    if let Some(url) = parse_video_url(input) {
        return extract_from_url(&url);
    }

    if input.contains("://") {
        return Err(YoutubeIdError::UnsupportedUrl);
    }

    // Bare id with optional trailing parameters
    let id = take_id_segment(input);
    if id.len() == CANONICAL_ID_LEN && is_valid_id_chars(id) {
        Ok(id.to_string())
    } else {
        Err(YoutubeIdError::InvalidVideoId)
    }
}

/// Resolve the id, substituting [`FALLBACK_VIDEO_ID`] for absent or
/// unresolvable input.
pub fn resolve_video_id_or_fallback(input: Option<&str>) -> String {
    input
        .and_then(|s| resolve_video_id(s).ok())
        .unwrap_or_else(|| FALLBACK_VIDEO_ID.to_string())
}

/// Parse `input` as a video-platform URL, tolerating a missing scheme.
fn parse_video_url(input: &str) -> Option<Url> {
    let lower = input.to_ascii_lowercase();
    if !(lower.contains("youtube.com") || lower.contains("youtu.be")) {
        return None;
    }

    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };

    let url = Url::parse(&candidate).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let host = host.strip_prefix("m.").unwrap_or(host);
    if host == "youtube.com" || host == "youtu.be" || host == "music.youtube.com" {
        Some(url)
    } else {
        None
    }
}

fn extract_from_url(url: &Url) -> YoutubeIdResult<String> {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    let candidate = if host.ends_with("youtu.be") {
        segments.first().map(|s| s.to_string())
    } else if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
        Some(v.into_owned())
    } else {
        match segments.as_slice() {
            ["embed", id, ..] | ["v", id, ..] | ["shorts", id, ..] | ["live", id, ..] => {
                Some(id.to_string())
            }
            _ => None,
        }
    };

    let id = candidate.ok_or(YoutubeIdError::VideoIdNotFound)?;
    validate_id(&id)
}

/// Cut a bare reference at the first parameter delimiter.
fn take_id_segment(segment: &str) -> &str {
    let end = segment
        .find(|c| matches!(c, '&' | '#' | '?' | '/'))
        .unwrap_or(segment.len());
    segment[..end].trim()
}

/// Check if string contains only valid id characters
fn is_valid_id_chars(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn validate_id(id: &str) -> YoutubeIdResult<String> {
    if id.is_empty() || id.len() > MAX_ID_LEN || !is_valid_id_chars(id) {
        return Err(YoutubeIdError::InvalidVideoId);
    }
    Ok(id.to_string())
}
