//! Real video acquisition.
//!
//! [`RealAcquisitionExecutor`] is the seam between the orchestrator and
//! whatever actually fetches bytes. [`YtDlpExecutor`] runs yt-dlp as a child
//! process; [`RemoteExecutor`](crate::RemoteExecutor) delegates to a capable
//! host over HTTP.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};
use vingest_models::VideoId;

use crate::error::{MediaError, MediaResult};

/// Something that can turn a video id into a local file.
#[async_trait]
pub trait RealAcquisitionExecutor: Send + Sync {
    /// Short name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Download `video_id` into `dest_dir`, returning the written file.
    ///
    /// Failures carry the raw downloader output so they can be classified.
    async fn download(&self, video_id: &VideoId, dest_dir: &Path) -> MediaResult<PathBuf>;
}

/// Canonical watch URL for a video id.
pub fn watch_url(video_id: &VideoId) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// In-process executor backed by the yt-dlp binary.
#[derive(Debug, Clone)]
pub struct YtDlpExecutor {
    binary: PathBuf,
    format: String,
    max_file_size: Option<u64>,
}

impl Default for YtDlpExecutor {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            format: "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string(),
            max_file_size: None,
        }
    }
}

impl YtDlpExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific binary instead of looking up `yt-dlp` in PATH.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Ask yt-dlp to abort downloads larger than `bytes`.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Whether the binary can be located.
    pub fn is_available(&self) -> bool {
        self.resolve_binary().is_ok()
    }

    fn resolve_binary(&self) -> MediaResult<PathBuf> {
        if self.binary.components().count() > 1 {
            return if self.binary.is_file() {
                Ok(self.binary.clone())
            } else {
                Err(MediaError::YtDlpNotFound)
            };
        }
        which::which(&self.binary).map_err(|_| MediaError::YtDlpNotFound)
    }

    fn build_args(&self, url: &str, output_path: &Path) -> Vec<String> {
        let mut args: Vec<String> = [
            "--no-playlist",
            "--no-progress",
            "--merge-output-format",
            "mp4",
            "-f",
            self.format.as_str(),
        ]
        .into_iter()
        .map(String::from)
        .collect();

        if let Some(limit) = self.max_file_size {
            args.push("--max-filesize".to_string());
            args.push(limit.to_string());
        }

        args.push("-o".to_string());
        args.push(output_path.to_string_lossy().into_owned());
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl RealAcquisitionExecutor for YtDlpExecutor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn download(&self, video_id: &VideoId, dest_dir: &Path) -> MediaResult<PathBuf> {
        let binary = self.resolve_binary()?;
        let url = watch_url(video_id);
        let output_path = dest_dir.join(format!("{}.mp4", video_id));

        info!(video_id = %video_id, output = %output_path.display(), "Downloading video with yt-dlp");

        let output = Command::new(&binary)
            .args(self.build_args(&url, &output_path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);

            // yt-dlp prints the reason on its last ERROR line
            let error_msg = stderr
                .lines()
                .rev()
                .find(|l| l.contains("ERROR"))
                .or_else(|| stderr.lines().last())
                .unwrap_or("Unknown error");

            warn!(video_id = %video_id, exit_code = ?output.status.code(), "yt-dlp failed");
            return Err(MediaError::download_failed(format!("yt-dlp failed: {}", error_msg.trim())));
        }

        if !output_path.exists() {
            return Err(MediaError::download_failed("Output file not created"));
        }

        let file_size = output_path.metadata()?.len();
        info!(
            output = %output_path.display(),
            size_mb = file_size as f64 / (1024.0 * 1024.0),
            "Downloaded video successfully"
        );

        Ok(output_path)
    }
}
