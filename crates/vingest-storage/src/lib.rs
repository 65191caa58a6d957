//! Object storage for acquired video assets.
//!
//! This crate provides:
//! - The [`ObjectStorage`] seam used by the pipeline
//! - A Cloudflare R2 (S3-compatible) backend
//! - A local-disk backend for single-host deployments and tests
//! - [`StorageUploader`], which lays out job assets and returns public references

pub mod client;
pub mod error;
pub mod local;
pub mod storage;
pub mod uploader;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use local::{LocalObjectStorage, LocalStorageConfig};
pub use storage::{join_public_url, ObjectStorage};
pub use uploader::{content_type_for, metadata_key, video_key, StorageUploader};
