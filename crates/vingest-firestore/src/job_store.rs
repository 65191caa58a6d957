//! Persistence seam for acquisition jobs.
//!
//! Every status write goes through [`VideoAcquisitionJob::apply`], so the
//! transition graph is enforced no matter which backend holds the record.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};
use vingest_models::{JobId, SourceReference, StatusUpdate, TransitionOutcome, VideoAcquisitionJob};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, StoreError, StoreResult};
use crate::metrics::record_job_write;
use crate::types::{fields_to_json, json_object_to_fields, Document};

/// Firestore collection holding acquisition jobs.
pub const JOBS_COLLECTION: &str = "video_acquisitions";

/// Fields rewritten on every status change. Fields named here but absent
/// from the written document are removed.
const MUTABLE_FIELDS: [&str; 8] = [
    "status",
    "video_id",
    "metadata",
    "storage_reference",
    "error_message",
    "error_kind",
    "retry_count",
    "updated_at",
];

/// Durable record of acquisition jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Short backend name for logs and metrics.
    fn backend(&self) -> &'static str;

    /// Create a job for `source` in its initial status.
    async fn create_job(&self, source: SourceReference) -> StoreResult<JobId> {
        let job = VideoAcquisitionJob::new(source);
        let id = job.id.clone();
        self.insert_job(job).await?;
        Ok(id)
    }

    /// Persist a fully built job. Fails if the id already exists.
    async fn insert_job(&self, job: VideoAcquisitionJob) -> StoreResult<()>;

    /// Apply a status update atomically.
    async fn update_status(&self, job_id: &JobId, update: &StatusUpdate) -> StoreResult<TransitionOutcome>;

    /// Fetch the current record.
    async fn get_job(&self, job_id: &JobId) -> StoreResult<VideoAcquisitionJob>;
}

fn outcome_label(outcome: TransitionOutcome) -> &'static str {
    match outcome {
        TransitionOutcome::Applied => "applied",
        TransitionOutcome::Unchanged => "unchanged",
    }
}

fn failure_label(error: &StoreError) -> &'static str {
    match error {
        StoreError::Transition(_) => "rejected",
        StoreError::Conflict(_) => "conflict",
        _ => "failed",
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Process-local job store.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, VideoAcquisitionJob>>,
    fail_writes: AtomicBool,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent status write fail as if the backend were down.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    async fn apply_update(&self, job_id: &JobId, update: &StatusUpdate) -> StoreResult<TransitionOutcome> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Firestore(FirestoreError::ServerError(
                503,
                "job store unavailable".into(),
            )));
        }
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.clone()))?;
        Ok(job.apply(update)?)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert_job(&self, job: VideoAcquisitionJob) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id));
        }
        debug!(job_id = %job.id, status = %job.status, "Stored job in memory");
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn update_status(&self, job_id: &JobId, update: &StatusUpdate) -> StoreResult<TransitionOutcome> {
        let result = self.apply_update(job_id, update).await;

        match &result {
            Ok(outcome) => record_job_write(self.backend(), outcome_label(*outcome)),
            Err(e) => record_job_write(self.backend(), failure_label(e)),
        }
        result
    }

    async fn get_job(&self, job_id: &JobId) -> StoreResult<VideoAcquisitionJob> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(job_id.clone()))
    }
}

// =============================================================================
// Firestore
// =============================================================================

/// Job store backed by the `video_acquisitions` collection.
///
/// Updates read the document, apply the transition locally, then write it
/// back with an `updateTime` precondition. A concurrent writer surfaces as
/// [`StoreError::Conflict`].
#[derive(Clone)]
pub struct FirestoreJobStore {
    client: FirestoreClient,
    collection: String,
}

impl FirestoreJobStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self {
            client,
            collection: JOBS_COLLECTION.to_string(),
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    async fn apply_update(&self, job_id: &JobId, update: &StatusUpdate) -> StoreResult<TransitionOutcome> {
        let (mut job, doc) = self.load(job_id).await?;
        let outcome = job.apply(update)?;
        if outcome == TransitionOutcome::Unchanged {
            return Ok(outcome);
        }

        let mut fields = job_to_fields(&job)?;
        fields.retain(|k, _| MUTABLE_FIELDS.contains(&k.as_str()));

        self.client
            .update_document_with_precondition(
                &self.collection,
                job_id.as_str(),
                fields,
                Some(MUTABLE_FIELDS.iter().map(|f| f.to_string()).collect()),
                doc.update_time.as_deref(),
            )
            .await
            .map_err(|e| {
                if e.is_precondition_failed() {
                    StoreError::Conflict(job_id.clone())
                } else {
                    StoreError::from(e)
                }
            })?;
        Ok(outcome)
    }

    async fn load(&self, job_id: &JobId) -> StoreResult<(VideoAcquisitionJob, Document)> {
        let doc = self
            .client
            .get_document(&self.collection, job_id.as_str())
            .await?
            .ok_or_else(|| StoreError::NotFound(job_id.clone()))?;
        let job = document_to_job(&doc)?;
        Ok((job, doc))
    }
}

fn job_to_fields(job: &VideoAcquisitionJob) -> StoreResult<HashMap<String, crate::types::Value>> {
    match serde_json::to_value(job).map_err(FirestoreError::from)? {
        serde_json::Value::Object(map) => Ok(json_object_to_fields(&map)),
        other => Err(StoreError::Malformed(format!("job serialized to {}", other))),
    }
}

fn document_to_job(doc: &Document) -> StoreResult<VideoAcquisitionJob> {
    serde_json::from_value(fields_to_json(doc.fields.as_ref()))
        .map_err(|e| StoreError::Malformed(e.to_string()))
}

#[async_trait]
impl JobStore for FirestoreJobStore {
    fn backend(&self) -> &'static str {
        "firestore"
    }

    async fn insert_job(&self, job: VideoAcquisitionJob) -> StoreResult<()> {
        let fields = job_to_fields(&job)?;
        match self
            .client
            .create_document(&self.collection, job.id.as_str(), fields)
            .await
        {
            Ok(_) => {
                info!(job_id = %job.id, status = %job.status, "Created acquisition job");
                Ok(())
            }
            Err(FirestoreError::AlreadyExists(_)) => Err(StoreError::AlreadyExists(job.id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_status(&self, job_id: &JobId, update: &StatusUpdate) -> StoreResult<TransitionOutcome> {
        let result = self.apply_update(job_id, update).await;

        match &result {
            Ok(outcome) => record_job_write(self.backend(), outcome_label(*outcome)),
            Err(e) => record_job_write(self.backend(), failure_label(e)),
        }
        result
    }

    async fn get_job(&self, job_id: &JobId) -> StoreResult<VideoAcquisitionJob> {
        Ok(self.load(job_id).await?.0)
    }
}
