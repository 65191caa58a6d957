//! External-first metadata resolution.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, warn};
use vingest_models::{VideoId, VideoMetadata};

use crate::error::MetadataResult;
use crate::fallback::fallback_metadata;

/// External metadata service.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the provider is configured well enough to be worth calling.
    fn is_available(&self) -> bool {
        true
    }

    async fn fetch(&self, video_id: &VideoId) -> MetadataResult<VideoMetadata>;
}

/// Resolves metadata for a video id, falling back to a deterministic record
/// when the provider is absent, unauthenticated or fails.
#[derive(Clone, Default)]
pub struct MetadataResolver {
    provider: Option<Arc<dyn MetadataProvider>>,
}

impl MetadataResolver {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Resolver that only ever produces fallback records.
    pub fn fallback_only() -> Self {
        Self::default()
    }

    pub fn has_provider(&self) -> bool {
        self.provider.as_ref().is_some_and(|p| p.is_available())
    }

    /// Resolve metadata. Never fails.
    pub async fn resolve(&self, video_id: &VideoId) -> VideoMetadata {
        let Some(provider) = self.provider.as_ref().filter(|p| p.is_available()) else {
            debug!(video_id = %video_id, "No metadata provider available, using fallback");
            return self.fallback(video_id);
        };

        match provider.fetch(video_id).await {
            Ok(metadata) => {
                counter!("vingest_metadata_lookups_total", "source" => "external").increment(1);
                metadata
            }
            Err(e) => {
                warn!(
                    video_id = %video_id,
                    provider = provider.name(),
                    reason = e.reason(),
                    error = %e,
                    "Metadata lookup failed, using fallback"
                );
                self.fallback(video_id)
            }
        }
    }

    /// Deterministic record for `video_id`.
    pub fn fallback(&self, video_id: &VideoId) -> VideoMetadata {
        counter!("vingest_metadata_lookups_total", "source" => "fallback").increment(1);
        fallback_metadata(video_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetadataError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use vingest_models::MetadataSource;

    struct StubProvider {
        available: bool,
        fail: bool,
        calls: AtomicU32,
    }

    impl StubProvider {
        fn new(available: bool, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                available,
                fail,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl MetadataProvider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn fetch(&self, video_id: &VideoId) -> MetadataResult<VideoMetadata> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MetadataError::NotFound(video_id.to_string()));
            }
            let mut m = fallback_metadata(video_id.as_str());
            m.title = "From provider".into();
            m.source = MetadataSource::External;
            Ok(m)
        }
    }

    #[tokio::test]
    async fn test_provider_result_is_used() {
        let provider = StubProvider::new(true, false);
        let resolver = MetadataResolver::new(provider.clone());
        let m = resolver.resolve(&VideoId::from("abc")).await;
        assert_eq!(m.title, "From provider");
        assert_eq!(m.source, MetadataSource::External);
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back() {
        let provider = StubProvider::new(true, true);
        let resolver = MetadataResolver::new(provider.clone());
        let m = resolver.resolve(&VideoId::from("abc")).await;
        assert_eq!(m, fallback_metadata("abc"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unavailable_provider_is_not_called() {
        let provider = StubProvider::new(false, false);
        let resolver = MetadataResolver::new(provider.clone());
        assert!(!resolver.has_provider());
        let m = resolver.resolve(&VideoId::from("abc")).await;
        assert_eq!(m.source, MetadataSource::Fallback);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_only_resolver() {
        let resolver = MetadataResolver::fallback_only();
        let a = resolver.resolve(&VideoId::from("dQw4w9WgXcQ")).await;
        let b = resolver.resolve(&VideoId::from("dQw4w9WgXcQ")).await;
        assert_eq!(a, b);
    }
}
