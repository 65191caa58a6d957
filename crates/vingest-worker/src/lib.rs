//! Video acquisition worker.
//!
//! This crate provides:
//! - Environment strategy selection (mock or real acquisition)
//! - Mock and real acquirers behind one trait
//! - The download orchestrator with bounded transient retries
//! - The job state machine persisting every transition
//! - A queue-driven executor with bounded concurrency and graceful shutdown

pub mod acquirer;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod retry;
pub mod state_machine;
pub mod strategy;

pub use acquirer::{Acquirer, MockAcquirer, RealAcquirer};
pub use config::{EnvironmentConfig, WorkerConfig};
pub use error::{AcquisitionFailure, WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use orchestrator::{Acquired, Completed, Orchestrator};
pub use retry::BackoffPolicy;
pub use state_machine::JobStateMachine;
pub use strategy::{select_strategy, AcquisitionMode, ExecutorKind};
