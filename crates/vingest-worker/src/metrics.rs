//! Worker metrics.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use vingest_models::ErrorKind;

use crate::strategy::AcquisitionMode;

/// Metric name constants for consistency.
pub mod names {
    /// Finished jobs by outcome (`ready`, `error`).
    pub const JOBS_TOTAL: &str = "vingest_jobs_total";

    /// Acquisition failures by error kind.
    pub const FAILURES_TOTAL: &str = "vingest_acquisition_failures_total";

    /// Transient retries performed by the orchestrator.
    pub const RETRIES_TOTAL: &str = "vingest_job_retries_total";

    /// Wall time of a full job run.
    pub const DURATION_SECONDS: &str = "vingest_job_duration_seconds";

    /// Job transitions by target status and outcome.
    pub const TRANSITIONS_TOTAL: &str = "vingest_job_transitions_total";

    /// Jobs currently running in this process.
    pub const JOBS_IN_FLIGHT: &str = "vingest_jobs_in_flight";

    /// Selected acquisition mode, set to 1 for the active one.
    pub const STRATEGY: &str = "vingest_acquisition_strategy";
}

/// Record a finished job.
pub fn record_job(outcome: &'static str, mode: AcquisitionMode, duration_secs: f64) {
    counter!(names::JOBS_TOTAL, "outcome" => outcome, "mode" => mode.as_str()).increment(1);
    histogram!(names::DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
}

/// Record a classified acquisition failure.
pub fn record_failure(kind: ErrorKind) {
    counter!(names::FAILURES_TOTAL, "kind" => kind.as_str()).increment(1);
}

/// Record retries taken by one acquisition.
pub fn record_retries(retries: u32) {
    if retries > 0 {
        counter!(names::RETRIES_TOTAL).increment(u64::from(retries));
    }
}

/// Record a job state transition.
pub fn record_transition(status: &'static str, outcome: &'static str) {
    counter!(names::TRANSITIONS_TOTAL, "status" => status, "outcome" => outcome).increment(1);
}

pub fn job_started() {
    gauge!(names::JOBS_IN_FLIGHT).increment(1.0);
}

pub fn job_finished() {
    gauge!(names::JOBS_IN_FLIGHT).decrement(1.0);
}

/// Publish the strategy chosen at startup.
pub fn record_strategy(mode: AcquisitionMode) {
    gauge!(names::STRATEGY, "mode" => mode.as_str()).set(1.0);
}

/// Serve Prometheus metrics on `0.0.0.0:{port}`.
pub fn install_exporter(port: u16) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
}
