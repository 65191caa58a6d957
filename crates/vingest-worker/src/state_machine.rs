//! Job lifecycle transitions.
//!
//! Every status change is one `update_status` write on the job store. The
//! store validates the transition against the status graph; this layer adds
//! logging and metrics around each write.

use std::sync::Arc;

use tracing::{debug, info, warn};
use vingest_firestore::{JobStore, StoreError, StoreResult};
use vingest_models::{JobId, SourceReference, StatusUpdate, TransitionOutcome, VideoAcquisitionJob};

use crate::metrics::record_transition;

#[derive(Clone)]
pub struct JobStateMachine {
    store: Arc<dyn JobStore>,
}

impl JobStateMachine {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Create a job in the initial status for its source.
    pub async fn create(&self, source: SourceReference) -> StoreResult<JobId> {
        let job_id = self.store.create_job(source.clone()).await?;
        info!(
            job_id = %job_id,
            source = %source,
            status = %source.initial_status(),
            backend = self.store.backend(),
            "Created acquisition job"
        );
        Ok(job_id)
    }

    pub async fn get(&self, job_id: &JobId) -> StoreResult<VideoAcquisitionJob> {
        self.store.get_job(job_id).await
    }

    /// Move `job_id` to `update.status` in one write.
    ///
    /// Repeating the current status is reported as
    /// [`TransitionOutcome::Unchanged`] and writes nothing.
    pub async fn transition(&self, job_id: &JobId, update: StatusUpdate) -> StoreResult<TransitionOutcome> {
        let status = update.status;

        match self.store.update_status(job_id, &update).await {
            Ok(TransitionOutcome::Applied) => {
                record_transition(status.as_str(), "applied");
                info!(job_id = %job_id, status = %status, "Job status updated");
                Ok(TransitionOutcome::Applied)
            }
            Ok(TransitionOutcome::Unchanged) => {
                record_transition(status.as_str(), "unchanged");
                debug!(job_id = %job_id, status = %status, "Job already in requested status");
                Ok(TransitionOutcome::Unchanged)
            }
            Err(e) => {
                let outcome = match e {
                    StoreError::Transition(_) => "rejected",
                    _ => "failed",
                };
                record_transition(status.as_str(), outcome);
                warn!(job_id = %job_id, status = %status, error = %e, "Failed to persist job transition");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vingest_firestore::InMemoryJobStore;
    use vingest_models::{ErrorKind, JobStatus};

    fn machine() -> (Arc<InMemoryJobStore>, JobStateMachine) {
        let store = Arc::new(InMemoryJobStore::new());
        (store.clone(), JobStateMachine::new(store))
    }

    #[tokio::test]
    async fn test_create_uses_initial_status() {
        let (_, sm) = machine();
        let url = sm.create(SourceReference::url("https://youtu.be/dQw4w9WgXcQ")).await.unwrap();
        let upload = sm.create(SourceReference::upload("/tmp/a.mp4", None)).await.unwrap();

        assert_eq!(sm.get(&url).await.unwrap().status, JobStatus::PendingDownload);
        assert_eq!(sm.get(&upload).await.unwrap().status, JobStatus::Uploaded);
    }

    #[tokio::test]
    async fn test_repeated_status_is_noop() {
        let (_, sm) = machine();
        let id = sm.create(SourceReference::url("x")).await.unwrap();

        assert_eq!(
            sm.transition(&id, StatusUpdate::processing()).await.unwrap(),
            TransitionOutcome::Applied
        );
        assert_eq!(
            sm.transition(&id, StatusUpdate::processing()).await.unwrap(),
            TransitionOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn test_illegal_transition_rejected() {
        let (_, sm) = machine();
        let id = sm.create(SourceReference::url("x")).await.unwrap();
        let err = sm
            .transition(&id, StatusUpdate::to(JobStatus::ReadyForAnalysis))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Transition(_)));
        assert_eq!(sm.get(&id).await.unwrap().status, JobStatus::PendingDownload);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let (store, sm) = machine();
        let id = sm.create(SourceReference::url("x")).await.unwrap();
        store.set_fail_writes(true);

        let err = sm
            .transition(&id, StatusUpdate::error(ErrorKind::NetworkError, "reset"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
