//! YouTube Data API v3 client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use vingest_models::{MetadataSource, VideoId, VideoMetadata};

use crate::error::{MetadataError, MetadataResult};
use crate::resolver::MetadataProvider;

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Value shipped in sample env files; treated as no key at all.
const PLACEHOLDER_API_KEY: &str = "your_youtube_data_api_v3_key";

/// YouTube Data API configuration.
#[derive(Debug, Clone)]
pub struct YoutubeApiConfig {
    /// API key; `None` means unauthenticated
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for YoutubeApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl YoutubeApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("YOUTUBE_API_KEY")
                .ok()
                .filter(|k| is_usable_key(k)),
            base_url: std::env::var("YOUTUBE_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("YOUTUBE_API_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.api_key.as_deref().is_some_and(is_usable_key)
    }
}

fn is_usable_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && key != PLACEHOLDER_API_KEY
}

/// Parse an ISO-8601 duration such as `PT4M13S` or `P1DT2H` into seconds.
pub fn parse_iso8601_duration(s: &str) -> Option<u64> {
    let rest = s.strip_prefix('P')?;
    let (date, time) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };

    let mut total = 0u64;
    let mut saw_component = false;

    let mut consume = |part: &str, units: &[(char, u64)]| -> Option<()> {
        let mut number = String::new();
        for c in part.chars() {
            if c.is_ascii_digit() {
                number.push(c);
                continue;
            }
            let (_, mult) = units.iter().find(|(u, _)| *u == c)?;
            let n: u64 = number.parse().ok()?;
            total = total.checked_add(n.checked_mul(*mult)?)?;
            number.clear();
            saw_component = true;
        }
        number.is_empty().then_some(())
    };

    consume(date, &[('W', 604_800), ('D', 86_400)])?;
    if let Some(time) = time {
        if time.is_empty() {
            return None;
        }
        consume(time, &[('H', 3_600), ('M', 60), ('S', 1)])?;
    }

    saw_component.then_some(total)
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResource {
    snippet: Snippet,
    content_details: ContentDetails,
    #[serde(default)]
    statistics: Statistics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    channel_title: String,
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
    #[serde(default)]
    definition: String,
}

/// Counts arrive as decimal strings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
    like_count: Option<String>,
}

fn best_thumbnail(thumbnails: &HashMap<String, Thumbnail>) -> Option<String> {
    ["maxres", "high", "medium", "default"]
        .iter()
        .find_map(|k| thumbnails.get(*k))
        .map(|t| t.url.clone())
}

fn parse_count(value: Option<&str>) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

impl VideoResource {
    fn into_metadata(self) -> VideoMetadata {
        let is_hd = self.content_details.definition == "hd";
        let (width, height) = if is_hd { (1280, 720) } else { (854, 480) };
        VideoMetadata {
            title: self.snippet.title,
            description: self.snippet.description,
            duration_secs: parse_iso8601_duration(&self.content_details.duration).unwrap_or(0),
            width,
            height,
            format: "mp4".to_string(),
            uploader: self.snippet.channel_title,
            view_count: parse_count(self.statistics.view_count.as_deref()),
            like_count: parse_count(self.statistics.like_count.as_deref()),
            thumbnail_url: best_thumbnail(&self.snippet.thumbnails),
            published_at: self.snippet.published_at,
            file_size: None,
            is_hd,
            source: MetadataSource::External,
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Client for the `videos.list` endpoint.
#[derive(Clone)]
pub struct YoutubeDataClient {
    http: Client,
    config: YoutubeApiConfig,
}

impl YoutubeDataClient {
    pub fn new(config: YoutubeApiConfig) -> MetadataResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("vingest-metadata/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> MetadataResult<Self> {
        Self::new(YoutubeApiConfig::from_env())
    }

    pub fn config(&self) -> &YoutubeApiConfig {
        &self.config
    }
}

#[async_trait]
impl MetadataProvider for YoutubeDataClient {
    fn name(&self) -> &'static str {
        "youtube_data_api"
    }

    fn is_available(&self) -> bool {
        self.config.is_authenticated()
    }

    async fn fetch(&self, video_id: &VideoId) -> MetadataResult<VideoMetadata> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| is_usable_key(k))
            .ok_or(MetadataError::Unauthenticated)?;

        let url = format!("{}/videos", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .query(&[
                ("id", video_id.as_str()),
                ("part", "snippet,contentDetails,statistics"),
                ("key", key),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetadataError::from_status(status.as_u16(), video_id.as_str(), body));
        }

        let list: VideoListResponse = response
            .json()
            .await
            .map_err(|e| MetadataError::invalid_response(e.to_string()))?;

        let video = list
            .items
            .into_iter()
            .next()
            .ok_or_else(|| MetadataError::NotFound(video_id.to_string()))?;

        debug!(video_id = %video_id, title = %video.snippet.title, "Fetched video metadata");
        Ok(video.into_metadata())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, key: Option<&str>) -> YoutubeDataClient {
        YoutubeDataClient::new(YoutubeApiConfig {
            api_key: key.map(String::from),
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_parse_iso8601_duration() {
        assert_eq!(parse_iso8601_duration("PT4M13S"), Some(253));
        assert_eq!(parse_iso8601_duration("PT1H"), Some(3600));
        assert_eq!(parse_iso8601_duration("PT45S"), Some(45));
        assert_eq!(parse_iso8601_duration("P1DT2M"), Some(86_520));
        assert_eq!(parse_iso8601_duration("P0D"), Some(0));
        assert_eq!(parse_iso8601_duration("4M13S"), None);
        assert_eq!(parse_iso8601_duration("PT"), None);
        assert_eq!(parse_iso8601_duration("PT5X"), None);
        assert_eq!(parse_iso8601_duration("PT12"), None);
    }

    #[test]
    fn test_thumbnail_preference() {
        let mut thumbs = HashMap::new();
        thumbs.insert("default".to_string(), Thumbnail { url: "d".into() });
        thumbs.insert("medium".to_string(), Thumbnail { url: "m".into() });
        assert_eq!(best_thumbnail(&thumbs).as_deref(), Some("m"));
        thumbs.insert("maxres".to_string(), Thumbnail { url: "x".into() });
        assert_eq!(best_thumbnail(&thumbs).as_deref(), Some("x"));
        assert_eq!(best_thumbnail(&HashMap::new()), None);
    }

    #[test]
    #[serial]
    fn test_placeholder_key_is_unauthenticated() {
        std::env::set_var("YOUTUBE_API_KEY", "your_youtube_data_api_v3_key");
        assert!(!YoutubeApiConfig::from_env().is_authenticated());
        std::env::set_var("YOUTUBE_API_KEY", "real-key");
        assert!(YoutubeApiConfig::from_env().is_authenticated());
        std::env::remove_var("YOUTUBE_API_KEY");
        assert!(!YoutubeApiConfig::from_env().is_authenticated());
    }

    #[tokio::test]
    async fn test_fetch_maps_video_resource() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos"))
            .and(query_param("id", "dQw4w9WgXcQ"))
            .and(query_param("key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "snippet": {
                        "title": "Never Gonna Give You Up",
                        "description": "Official video",
                        "channelTitle": "Rick Astley",
                        "publishedAt": "2009-10-25T06:57:33Z",
                        "thumbnails": {
                            "high": {"url": "https://i.ytimg.com/high.jpg"},
                            "default": {"url": "https://i.ytimg.com/default.jpg"}
                        }
                    },
                    "contentDetails": {"duration": "PT3M33S", "definition": "hd"},
                    "statistics": {"viewCount": "1500000000", "likeCount": "17000000"}
                }]
            })))
            .mount(&server)
            .await;

        let metadata = client_for(&server, Some("k"))
            .fetch(&VideoId::from("dQw4w9WgXcQ"))
            .await
            .unwrap();

        assert_eq!(metadata.title, "Never Gonna Give You Up");
        assert_eq!(metadata.uploader, "Rick Astley");
        assert_eq!(metadata.duration_secs, 213);
        assert_eq!(metadata.view_count, 1_500_000_000);
        assert!(metadata.is_hd);
        assert_eq!(metadata.thumbnail_url.as_deref(), Some("https://i.ytimg.com/high.jpg"));
        assert_eq!(metadata.source, MetadataSource::External);
    }

    #[tokio::test]
    async fn test_fetch_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("id", "forbidden"))
            .respond_with(ResponseTemplate::new(403).set_body_string("quotaExceeded"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("id", "gone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("k"));
        assert!(matches!(
            client.fetch(&VideoId::from("forbidden")).await,
            Err(MetadataError::QuotaExceeded(_))
        ));
        assert!(matches!(
            client.fetch(&VideoId::from("gone")).await,
            Err(MetadataError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_without_key_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        assert!(!client.is_available());
        assert!(matches!(
            client.fetch(&VideoId::from("abc")).await,
            Err(MetadataError::Unauthenticated)
        ));
    }
}
