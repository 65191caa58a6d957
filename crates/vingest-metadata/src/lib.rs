//! Video metadata resolution.
//!
//! This crate provides:
//! - The [`MetadataProvider`] seam for external metadata services
//! - A YouTube Data API v3 client
//! - Deterministic fallback metadata derived from the video id alone
//! - [`MetadataResolver`], which never fails to produce a record

pub mod error;
pub mod fallback;
pub mod resolver;
pub mod youtube;

pub use error::{MetadataError, MetadataResult};
pub use fallback::fallback_metadata;
pub use resolver::{MetadataProvider, MetadataResolver};
pub use youtube::{parse_iso8601_duration, YoutubeApiConfig, YoutubeDataClient};
