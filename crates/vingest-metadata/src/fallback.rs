//! Deterministic metadata derived from the video id.
//!
//! Every field is a pure function of the id's SHA-256 digest, so the same id
//! always yields the same record and no clock or RNG is involved.

use chrono::{TimeZone, Utc};
use sha2::{Digest, Sha256};
use vingest_models::{MetadataSource, VideoMetadata};

const TITLES: [&str; 6] = [
    "Weekend Cooking Session",
    "City Walk at Dusk",
    "Quick Guitar Lesson",
    "Studio Vlog",
    "Morning Workout Routine",
    "Travel Highlights",
];

const UPLOADERS: [&str; 5] = [
    "Everyday Channel",
    "Creator Studio",
    "Open Stage",
    "Field Notes",
    "Late Night Edit",
];

/// Shortest fallback duration in seconds.
const MIN_DURATION_SECS: u64 = 120;
/// Width of the duration range in seconds.
const DURATION_SPAN_SECS: u64 = 300;
const MIN_VIEWS: u64 = 10_000;
const VIEW_SPAN: u64 = 90_000;

fn word(digest: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[offset..offset + 8]);
    u64::from_be_bytes(bytes)
}

/// Build the fallback record for `video_id`.
pub fn fallback_metadata(video_id: &str) -> VideoMetadata {
    let digest = Sha256::digest(video_id.as_bytes());

    let title = TITLES[(digest[0] as usize) % TITLES.len()];
    let uploader = UPLOADERS[(digest[1] as usize) % UPLOADERS.len()];
    let duration_secs = MIN_DURATION_SECS + word(&digest, 2) % DURATION_SPAN_SECS;
    let view_count = MIN_VIEWS + word(&digest, 10) % VIEW_SPAN;
    let like_count = view_count / 20 + word(&digest, 18) % 500;
    let is_hd = digest[26] % 2 == 0;
    let (width, height) = if is_hd { (1280, 720) } else { (854, 480) };

    VideoMetadata {
        title: format!("{} ({})", title, video_id),
        description: format!("{} by {}. Metadata generated offline.", title, uploader),
        duration_secs,
        width,
        height,
        format: "mp4".to_string(),
        uploader: uploader.to_string(),
        view_count,
        like_count,
        thumbnail_url: Some(format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", video_id)),
        published_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single(),
        file_size: None,
        is_hd,
        source: MetadataSource::Fallback,
    }
}
