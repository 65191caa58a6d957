//! Wiring of backends from the environment.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use vingest_firestore::{FirestoreClient, FirestoreConfig, FirestoreJobStore, InMemoryJobStore, JobStore};
use vingest_media::{RealAcquisitionExecutor, RemoteExecutor, RemoteExecutorConfig, WorkspaceRoot, YtDlpExecutor};
use vingest_metadata::{MetadataResolver, YoutubeDataClient};
use vingest_storage::{LocalObjectStorage, ObjectStorage, R2Client, R2Config, StorageUploader};

use crate::acquirer::{Acquirer, MockAcquirer, RealAcquirer, UnavailableExecutor};
use crate::config::{EnvironmentConfig, WorkerConfig};
use crate::error::WorkerResult;
use crate::metrics::record_strategy;
use crate::orchestrator::Orchestrator;
use crate::state_machine::JobStateMachine;
use crate::strategy::{select_with_reason, AcquisitionMode, ExecutorKind};

/// Firestore when a project is configured, in-memory otherwise.
pub async fn build_job_store() -> WorkerResult<Arc<dyn JobStore>> {
    if FirestoreConfig::is_configured() {
        let client = FirestoreClient::new(FirestoreConfig::from_env()?).await?;
        info!("Using Firestore job store");
        Ok(Arc::new(FirestoreJobStore::new(client)))
    } else {
        warn!("No Firestore project configured, jobs are kept in memory");
        Ok(Arc::new(InMemoryJobStore::new()))
    }
}

/// R2 when its credentials are present, local disk otherwise.
pub async fn build_object_storage() -> WorkerResult<Arc<dyn ObjectStorage>> {
    match R2Config::from_env() {
        Ok(config) => {
            let client = R2Client::new(config).await?;
            info!("Using R2 object storage");
            Ok(Arc::new(client))
        }
        Err(e) => {
            let local = LocalObjectStorage::from_env();
            warn!(reason = %e, "R2 not configured, storing objects on local disk");
            Ok(Arc::new(local))
        }
    }
}

/// Resolver backed by the YouTube Data API when a key is configured.
pub fn build_metadata_resolver() -> WorkerResult<MetadataResolver> {
    let client = YoutubeDataClient::from_env()?;
    if client.config().is_authenticated() {
        info!("Using YouTube Data API for metadata");
        Ok(MetadataResolver::new(Arc::new(client)))
    } else {
        info!("No YouTube API key configured, metadata uses fallback records");
        Ok(MetadataResolver::fallback_only())
    }
}

/// Build the acquirer for `mode`.
pub fn build_acquirer(
    mode: AcquisitionMode,
    env: &EnvironmentConfig,
    config: &WorkerConfig,
    resolver: MetadataResolver,
) -> WorkerResult<Arc<dyn Acquirer>> {
    let executor: Arc<dyn RealAcquisitionExecutor> = match mode {
        AcquisitionMode::Mock => return Ok(Arc::new(MockAcquirer::new())),
        AcquisitionMode::Real(ExecutorKind::InProcess) => {
            let binary = std::env::var("YT_DLP_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("yt-dlp"));
            Arc::new(
                YtDlpExecutor::new()
                    .with_binary(binary)
                    .with_max_file_size(config.max_file_size),
            )
        }
        AcquisitionMode::Real(ExecutorKind::Remote) => match env.remote_executor_url.as_deref() {
            Some(url) => {
                let remote = RemoteExecutorConfig {
                    token: std::env::var("VINGEST_REMOTE_EXECUTOR_TOKEN").ok(),
                    timeout: config.attempt_timeout,
                    ..RemoteExecutorConfig::new(url)
                };
                Arc::new(RemoteExecutor::new(remote.with_max_file_size(config.max_file_size))?)
            }
            None => {
                warn!("Remote acquisition selected but VINGEST_REMOTE_EXECUTOR_URL is unset");
                Arc::new(UnavailableExecutor::new("no remote executor configured"))
            }
        },
    };

    info!(executor = executor.name(), "Using real acquisition executor");
    Ok(Arc::new(RealAcquirer::new(executor, resolver, config.max_file_size, mode)))
}

/// Assemble the orchestrator from the environment.
pub async fn build_orchestrator(config: &WorkerConfig, env: &EnvironmentConfig) -> WorkerResult<Orchestrator> {
    let (mode, reason) = select_with_reason(env);
    info!(mode = %mode, reason, "Selected acquisition strategy");
    record_strategy(mode);

    let store = build_job_store().await?;
    let storage = build_object_storage().await?;
    let resolver = build_metadata_resolver()?;
    let acquirer = build_acquirer(mode, env, config, resolver)?;

    Ok(Orchestrator::new(
        acquirer,
        StorageUploader::new(storage),
        JobStateMachine::new(store),
        WorkspaceRoot::new(&config.work_dir),
    )
    .with_backoff(config.backoff.clone())
    .with_attempt_timeout(config.attempt_timeout)
    .with_max_file_size(config.max_file_size))
}
