//! Object storage seam.

use async_trait::async_trait;
use std::path::Path;

use crate::error::{StorageError, StorageResult};

/// Durable object store for finished assets.
///
/// `put_*` returns the public reference of the written object.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Backend name for logs.
    fn backend(&self) -> &'static str;

    /// Public reference for `key`, whether or not it exists yet.
    fn public_url(&self, key: &str) -> String;

    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> StorageResult<String>;

    async fn put_bytes(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<String>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    async fn delete(&self, key: &str) -> StorageResult<()>;
}

/// Reject keys that could escape the bucket layout.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Err(StorageError::invalid_key(key));
    }
    Ok(())
}

/// Join a base URL and an object key, percent-encoding each key segment.
pub fn join_public_url(base: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect();
    format!("{}/{}", base.trim_end_matches('/'), encoded.join("/"))
}
