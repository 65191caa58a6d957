//! Video identifier and metadata models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform identifier of a video (e.g. `dQw4w9WgXcQ`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Where a metadata record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSource {
    /// External metadata service
    External,
    /// Derived deterministically from the video id
    #[default]
    Fallback,
    /// Probed from the local file
    Probe,
}

impl MetadataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataSource::External => "external",
            MetadataSource::Fallback => "fallback",
            MetadataSource::Probe => "probe",
        }
    }
}

/// Structured metadata attached to a job once acquisition succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetadata {
    /// Video title
    pub title: String,

    /// Description, truncated to a reasonable length
    #[serde(default)]
    pub description: String,

    /// Duration in seconds
    pub duration_secs: u64,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Container format (e.g. "mp4")
    pub format: String,

    /// Channel or uploader name
    pub uploader: String,

    #[serde(default)]
    pub view_count: u64,

    #[serde(default)]
    pub like_count: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,

    /// Size of the stored artifact in bytes, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,

    #[serde(default)]
    pub is_hd: bool,

    #[serde(default)]
    pub source: MetadataSource,
}

impl VideoMetadata {
    /// Attach the stored artifact size.
    pub fn with_file_size(mut self, size: u64) -> Self {
        self.file_size = Some(size);
        self
    }

    /// Human-readable duration, `H:MM:SS` or `M:SS`.
    pub fn duration_display(&self) -> String {
        let h = self.duration_secs / 3600;
        let m = (self.duration_secs % 3600) / 60;
        let s = self.duration_secs % 60;
        if h > 0 {
            format!("{}:{:02}:{:02}", h, m, s)
        } else {
            format!("{}:{:02}", m, s)
        }
    }
}
