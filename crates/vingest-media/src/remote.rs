//! Remote acquisition executor.
//!
//! Used when this process cannot run the downloader itself: the download is
//! requested from a capable host and the body streamed into the job
//! workspace.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use vingest_models::VideoId;

use crate::download::{watch_url, RealAcquisitionExecutor};
use crate::error::{MediaError, MediaResult};

/// Configuration for the remote executor.
#[derive(Debug, Clone)]
pub struct RemoteExecutorConfig {
    /// Base URL of the capable host
    pub base_url: String,
    /// Bearer token sent with each request
    pub token: Option<String>,
    /// Whole-request timeout
    pub timeout: Duration,
    /// Abort bodies larger than this
    pub max_file_size: Option<u64>,
}

impl RemoteExecutorConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            timeout: Duration::from_secs(600),
            max_file_size: None,
        }
    }

    /// Create config from environment variables.
    ///
    /// Returns `None` when `VINGEST_REMOTE_EXECUTOR_URL` is unset.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("VINGEST_REMOTE_EXECUTOR_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())?;

        let mut config = Self::new(base_url);
        config.token = std::env::var("VINGEST_REMOTE_EXECUTOR_TOKEN").ok();
        config.timeout = Duration::from_secs(
            std::env::var("VINGEST_REMOTE_EXECUTOR_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(600),
        );
        Some(config)
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }
}

#[derive(Debug, Serialize)]
struct DownloadRequest<'a> {
    video_id: &'a str,
    url: String,
}

/// Executor that asks a remote host to perform the download.
pub struct RemoteExecutor {
    http: Client,
    config: RemoteExecutorConfig,
}

impl RemoteExecutor {
    pub fn new(config: RemoteExecutorConfig) -> MediaResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn check_size(&self, size: u64) -> MediaResult<()> {
        match self.config.max_file_size {
            Some(limit) if size > limit => Err(MediaError::FileTooLarge { size, limit }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl RealAcquisitionExecutor for RemoteExecutor {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn download(&self, video_id: &VideoId, dest_dir: &Path) -> MediaResult<PathBuf> {
        let endpoint = format!("{}/download", self.config.base_url);
        debug!(video_id = %video_id, endpoint = %endpoint, "Requesting remote download");

        let mut request = self.http.post(&endpoint).json(&DownloadRequest {
            video_id: video_id.as_str(),
            url: watch_url(video_id),
        });
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let mut response = request.send().await.map_err(|e| {
            if e.is_connect() {
                MediaError::executor_unavailable(e.to_string())
            } else {
                MediaError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(video_id = %video_id, status = %status, "Remote executor rejected download");
            return Err(match status {
                StatusCode::SERVICE_UNAVAILABLE | StatusCode::NOT_IMPLEMENTED => {
                    MediaError::executor_unavailable(format!("{}: {}", status, body))
                }
                _ => MediaError::download_failed(format!("remote executor returned {}: {}", status, body)),
            });
        }

        if let Some(len) = response.content_length() {
            self.check_size(len)?;
        }

        let output_path = dest_dir.join(format!("{}.mp4", video_id));
        let mut file = tokio::fs::File::create(&output_path).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = response.chunk().await? {
            written += chunk.len() as u64;
            self.check_size(written)?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if written == 0 {
            return Err(MediaError::download_failed("remote executor returned an empty body"));
        }

        info!(video_id = %video_id, bytes = written, "Remote download complete");
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Answers every request with a body shorter than its Content-Length.
    async fn truncating_host() -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.ends_with(b"}") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\npartial-body")
                    .await;
            }
        });
        format!("http://{}", addr)
    }

    async fn executor(server: &MockServer) -> RemoteExecutor {
        let mut config = RemoteExecutorConfig::new(format!("{}/", server.uri()));
        config.token = Some("secret".into());
        RemoteExecutor::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_streams_body_to_workspace() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/download"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(serde_json::json!({
                "video_id": "dQw4w9WgXcQ",
                "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fake-mp4".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = executor(&server)
            .await
            .download(&VideoId::from("dQw4w9WgXcQ"), dir.path())
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("dQw4w9WgXcQ.mp4"));
        assert_eq!(std::fs::read(path).unwrap(), b"fake-mp4");
    }

    #[tokio::test]
    async fn test_error_body_is_kept_for_classification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/download"))
            .respond_with(ResponseTemplate::new(422).set_body_string("ERROR: Private video"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = executor(&server)
            .await
            .download(&VideoId::from("abc"), dir.path())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Private video"));
        assert_eq!(crate::classify_error(&err), vingest_models::ErrorKind::PrivateVideo);
    }

    #[tokio::test]
    async fn test_truncated_body_is_network_error() {
        let base_url = truncating_host().await;
        let dir = tempfile::tempdir().unwrap();
        let err = RemoteExecutor::new(RemoteExecutorConfig::new(base_url))
            .unwrap()
            .download(&VideoId::from("dQw4w9WgXcQ"), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Http(_)), "{err}");
        let kind = crate::classify_error(&err);
        assert_eq!(kind, vingest_models::ErrorKind::NetworkError);
        assert!(kind.is_transient());
    }

    #[tokio::test]
    async fn test_unavailable_host() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = executor(&server)
            .await
            .download(&VideoId::from("abc"), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::ExecutorUnavailable(_)));
    }

    #[tokio::test]
    async fn test_size_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 2048]))
            .mount(&server)
            .await;

        let config = RemoteExecutorConfig::new(server.uri()).with_max_file_size(1024);
        let dir = tempfile::tempdir().unwrap();
        let err = RemoteExecutor::new(config)
            .unwrap()
            .download(&VideoId::from("abc"), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::FileTooLarge { limit: 1024, .. }));
    }
}
