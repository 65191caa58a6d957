//! Local-disk object storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::storage::{join_public_url, validate_key, ObjectStorage};

/// Configuration for local storage.
#[derive(Debug, Clone)]
pub struct LocalStorageConfig {
    /// Directory objects are written under
    pub root: PathBuf,
    /// Base URL the directory is served from
    pub public_base_url: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        let root = PathBuf::from("/var/lib/vingest/storage");
        Self {
            public_base_url: format!("file://{}", root.display()),
            root,
        }
    }
}

impl LocalStorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let default = Self::default();
        let root = std::env::var("STORAGE_LOCAL_ROOT")
            .map(PathBuf::from)
            .unwrap_or(default.root);
        let public_base_url = std::env::var("STORAGE_PUBLIC_URL")
            .unwrap_or_else(|_| format!("file://{}", root.display()));
        Self { root, public_base_url }
    }
}

/// Stores objects as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    config: LocalStorageConfig,
}

impl LocalObjectStorage {
    pub fn new(config: LocalStorageConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(LocalStorageConfig::from_env())
    }

    /// Filesystem location of `key`.
    pub fn object_path(&self, key: &str) -> PathBuf {
        self.config.root.join(key)
    }

    async fn prepare(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        let dst = self.object_path(key);
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(dst)
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    fn backend(&self) -> &'static str {
        "local"
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.config.public_base_url, key)
    }

    async fn put_file(&self, key: &str, path: &Path, _content_type: &str) -> StorageResult<String> {
        let dst = self.prepare(key).await?;
        // Write next to the target and rename so readers never see a partial object
        let staging = dst.with_extension("partial");
        tokio::fs::copy(path, &staging)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", path.display(), e)))?;
        tokio::fs::rename(&staging, &dst).await?;

        info!("Stored {} at {}", path.display(), dst.display());
        Ok(self.public_url(key))
    }

    async fn put_bytes(&self, key: &str, data: Vec<u8>, _content_type: &str) -> StorageResult<String> {
        let dst = self.prepare(key).await?;
        debug!("Writing {} bytes to {}", data.len(), dst.display());
        tokio::fs::write(&dst, data).await?;
        Ok(self.public_url(key))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(tokio::fs::try_exists(self.object_path(key)).await?)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        match tokio::fs::remove_file(self.object_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::not_found(key)),
            Err(e) => Err(StorageError::delete_failed(e.to_string())),
        }
    }
}
