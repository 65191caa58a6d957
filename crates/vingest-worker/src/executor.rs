//! Queue-driven job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vingest_queue::{JobQueue, QueueJob};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::orchestrator::Orchestrator;
use crate::retry::FailureTracker;

/// How a finished delivery is settled on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Done with this message; the job record holds the outcome.
    Ack,
    /// Leave pending so it is redelivered or claimed later.
    Redeliver,
    /// Give up on the message.
    DeadLetter,
}

/// Decide what to do with a message after one run.
pub fn settle(result: &WorkerResult<()>, delivery: u32, max_deliveries: u32) -> Settlement {
    match result {
        Ok(()) => Settlement::Ack,
        Err(WorkerError::Acquisition(failure)) if failure.is_persisted() => Settlement::Ack,
        Err(e) if e.is_retryable() && delivery < max_deliveries => Settlement::Redeliver,
        Err(_) => Settlement::DeadLetter,
    }
}

/// Job executor that processes acquisition requests from the queue.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    orchestrator: Arc<Orchestrator>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: JobQueue, orchestrator: Arc<Orchestrator>) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            orchestrator,
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Start the executor. Returns after [`JobExecutor::shutdown`] once
    /// in-flight jobs finish or the shutdown timeout elapses.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            consumer = %self.consumer_name,
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            mode = %self.orchestrator.acquirer().mode(),
            "Starting job executor"
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();
        let claim_task = self.spawn_claim_task();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!(error = %e, "Error consuming jobs");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                timeout_secs = self.config.shutdown_timeout.as_secs(),
                "Shutdown timeout elapsed with jobs still running"
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Periodically claim messages abandoned by dead consumers.
    fn spawn_claim_task(&self) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let orchestrator = Arc::clone(&self.orchestrator);
        let semaphore = Arc::clone(&self.job_semaphore);
        let consumer_name = self.consumer_name.clone();
        let claim_interval = self.config.claim_interval;
        let min_idle = self.config.claim_min_idle;
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(claim_interval);
            let mut failures = FailureTracker::new(3);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match queue.claim_pending(&consumer_name, min_idle, 5).await {
                            Ok(jobs) => {
                                failures.record_success();
                                if !jobs.is_empty() {
                                    info!(count = jobs.len(), "Claimed pending jobs");
                                }
                                for (message_id, job) in jobs {
                                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                                        break;
                                    };
                                    let orchestrator = Arc::clone(&orchestrator);
                                    let queue = Arc::clone(&queue);
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute_job(orchestrator, queue, message_id, job).await;
                                    });
                                }
                            }
                            Err(e) => {
                                if failures.record_failure() {
                                    warn!(error = %e, "Failed to claim pending jobs");
                                }
                            }
                        }
                    }
                }
            }
        })
    }

    /// Consume and dispatch jobs from the queue.
    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(&self.consumer_name, 1000, available.min(5))
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!(count = jobs.len(), "Consumed jobs from queue");

        for (message_id, job) in jobs {
            let orchestrator = Arc::clone(&self.orchestrator);
            let queue = Arc::clone(&self.queue);
            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::config_error("job semaphore closed"))?;

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(orchestrator, queue, message_id, job).await;
            });
        }

        Ok(())
    }

    /// Execute a single delivery and settle it on the queue.
    async fn execute_job(orchestrator: Arc<Orchestrator>, queue: Arc<JobQueue>, message_id: String, job: QueueJob) {
        let job_id = job.job_id().clone();
        info!(job_id = %job_id, kind = job.kind(), message_id = %message_id, "Executing job");

        let result = Self::process_job(&orchestrator, &job).await;

        let delivery = if result.is_ok() {
            0
        } else {
            match queue.increment_retry(&message_id).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Failed to count delivery");
                    u32::MAX
                }
            }
        };

        match (settle(&result, delivery, queue.max_retries()), &result) {
            (Settlement::Ack, _) => {
                if let Err(e) = &result {
                    info!(job_id = %job_id, error = %e, "Job failed with recorded error");
                } else {
                    info!(job_id = %job_id, "Job completed successfully");
                }
                if let Err(e) = queue.ack(&message_id).await {
                    error!(job_id = %job_id, error = %e, "Failed to ack job");
                }
            }
            (Settlement::Redeliver, Err(e)) => {
                info!(
                    job_id = %job_id,
                    delivery,
                    max = queue.max_retries(),
                    error = %e,
                    "Job will be retried"
                );
            }
            (_, result) => {
                let reason = match result {
                    Err(e) => e.to_string(),
                    Ok(()) => "unknown".to_string(),
                };
                warn!(job_id = %job_id, reason = %reason, "Moving job to DLQ");
                if let Err(dlq_err) = queue.dlq(&message_id, &job, &reason).await {
                    error!(job_id = %job_id, error = %dlq_err, "Failed to move job to DLQ");
                }
            }
        }
    }

    async fn process_job(orchestrator: &Orchestrator, job: &QueueJob) -> WorkerResult<()> {
        match job {
            QueueJob::Acquire(j) => {
                let record = orchestrator.state().get(&j.job_id).await?;
                if record.is_terminal() {
                    info!(job_id = %j.job_id, status = %record.status, "Job already finished, skipping");
                    return Ok(());
                }
                orchestrator.process(&record).await.map(|_| ())
            }
            QueueJob::Retry(j) => orchestrator.retry_job(&j.job_id).await.map(|_| ()),
        }
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        while self.job_semaphore.available_permits() < self.config.max_concurrent_jobs {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AcquisitionFailure;
    use vingest_firestore::StoreError;
    use vingest_models::{ErrorKind, JobId, JobStatus};

    #[test]
    fn test_success_is_acked() {
        assert_eq!(settle(&Ok(()), 0, 3), Settlement::Ack);
    }

    #[test]
    fn test_recorded_failure_is_acked() {
        let failure = AcquisitionFailure::new(ErrorKind::PrivateVideo, "Private video", 0);
        assert_eq!(settle(&Err(failure.into()), 1, 3), Settlement::Ack);
    }

    #[test]
    fn test_unrecorded_failure_is_redelivered_until_cap() {
        let mut failure = AcquisitionFailure::new(ErrorKind::NetworkError, "reset", 2);
        failure.persistence_error = Some("store down".into());

        assert_eq!(settle(&Err(failure.clone().into()), 1, 3), Settlement::Redeliver);
        assert_eq!(settle(&Err(failure.into()), 3, 3), Settlement::DeadLetter);
    }

    #[test]
    fn test_permanent_errors_are_dead_lettered() {
        let err = WorkerError::InvalidState {
            job_id: JobId::from_string("j"),
            status: JobStatus::ReadyForAnalysis,
            expected: JobStatus::Error,
        };
        assert_eq!(settle(&Err(err), 1, 3), Settlement::DeadLetter);

        let missing = WorkerError::Store(StoreError::NotFound(JobId::from_string("j")));
        assert_eq!(settle(&Err(missing), 1, 3), Settlement::DeadLetter);
    }
}
