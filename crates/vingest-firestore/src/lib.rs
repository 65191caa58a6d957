//! Firestore REST API client and acquisition job store.
//!
//! This crate provides:
//! - The [`JobStore`] seam through which job transitions are persisted
//! - A Firestore-backed store with optimistic concurrency on every write
//! - An in-memory store for tests and single-process runs
//! - Service account authentication via gcp_auth with token caching
//! - Retry with backoff for transient Firestore failures

pub mod client;
pub mod error;
pub mod job_store;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult, StoreError, StoreResult};
pub use job_store::{FirestoreJobStore, InMemoryJobStore, JobStore, JOBS_COLLECTION};
pub use retry::RetryConfig;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
