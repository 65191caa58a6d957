//! Video acquisition primitives.
//!
//! This crate provides:
//! - The ordered failure classification table
//! - Real acquisition executors (in-process yt-dlp, remote HTTP executor)
//! - Job-scoped temporary workspaces released on every exit path
//! - FFprobe inspection of local video files

pub mod classify;
pub mod download;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod remote;

pub use classify::{classify, classify_error, ClassificationRule, CLASSIFICATION_RULES};
pub use download::{watch_url, RealAcquisitionExecutor, YtDlpExecutor};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{check_upload_extension, file_size, JobWorkspace, WorkspaceRoot};
pub use probe::{probe_video, VideoInfo};
pub use remote::{RemoteExecutor, RemoteExecutorConfig};
