//! Shared data models for the video acquisition pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Acquisition jobs and their source references
//! - The job status graph and transition rules
//! - Video metadata records
//! - The acquisition error taxonomy
//! - Video identifier resolution from shared URLs

pub mod error_kind;
pub mod job;
pub mod job_status;
pub mod utils;
pub mod video;

// Re-export common types
pub use error_kind::ErrorKind;
pub use job::{JobId, SourceReference, StatusUpdate, TransitionError, TransitionOutcome, VideoAcquisitionJob};
pub use job_status::JobStatus;
pub use utils::{resolve_video_id, resolve_video_id_or_fallback, YoutubeIdError, YoutubeIdResult, FALLBACK_VIDEO_ID};
pub use video::{MetadataSource, VideoId, VideoMetadata};
