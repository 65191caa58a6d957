//! Redis Streams queue for acquisition requests.
//!
//! This crate provides:
//! - Job enqueueing with idempotency keys
//! - Consumer-group consumption with ack, retry counting and a dead-letter stream
//! - Recovery of messages left pending by crashed workers

pub mod error;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::{AcquireVideoJob, QueueJob, RetryAcquisitionJob};
pub use queue::{JobQueue, QueueConfig};
