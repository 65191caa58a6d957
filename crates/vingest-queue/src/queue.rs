//! Job queue using Redis Streams.

use std::time::Duration;

use redis::streams::{StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::QueueJob;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter queue stream name
    pub dlq_stream_name: String,
    /// Max deliveries before a message goes to the DLQ
    pub max_retries: u32,
    /// Pending messages idle this long are reclaimed from dead consumers
    pub visibility_timeout: Duration,
    /// How long an idempotency key blocks duplicates
    pub dedup_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vingest:acquisitions".to_string(),
            consumer_group: "vingest:workers".to_string(),
            dlq_stream_name: "vingest:dlq".to_string(),
            max_retries: 3,
            visibility_timeout: Duration::from_secs(600),
            dedup_ttl: Duration::from_secs(3600),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(default.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(default.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP").unwrap_or(default.consumer_group),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM").unwrap_or(default.dlq_stream_name),
            max_retries: std::env::var("QUEUE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_retries),
            visibility_timeout: std::env::var("QUEUE_VISIBILITY_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.visibility_timeout),
            dedup_ttl: default.dedup_ttl,
        }
    }

    fn dedup_key(&self, idempotency_key: &str) -> String {
        format!("{}:dedup:{}", self.stream_name, idempotency_key)
    }

    fn retry_key(&self, message_id: &str) -> String {
        format!("{}:retry:{}", self.stream_name, message_id)
    }
}

/// Job queue client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => info!(group = %self.config.consumer_group, "Created consumer group"),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(group = %self.config.consumer_group, "Consumer group already exists");
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Enqueue a job. Rejects a job whose idempotency key was seen recently.
    pub async fn enqueue(&self, job: &QueueJob) -> QueueResult<String> {
        let mut conn = self.connection().await?;

        let payload = serde_json::to_string(job)?;
        let idempotency_key = job.idempotency_key();

        let dedup_key = self.config.dedup_key(&idempotency_key);
        let claimed: Option<String> = redis::cmd("SET")
            .arg(&dedup_key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.config.dedup_ttl.as_secs())
            .query_async(&mut conn)
            .await?;
        if claimed.is_none() {
            warn!(key = %idempotency_key, "Duplicate job rejected");
            return Err(QueueError::Duplicate(idempotency_key));
        }

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("key")
            .arg(&idempotency_key)
            .query_async(&mut conn)
            .await?;

        info!(job_id = %job.job_id(), kind = job.kind(), message_id = %message_id, "Enqueued job");
        Ok(message_id)
    }

    /// Acknowledge a job (mark as completed).
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        conn.del::<_, ()>(self.config.retry_key(message_id)).await?;

        debug!(message_id = %message_id, "Acknowledged job");
        Ok(())
    }

    /// Move a job to the dead letter queue.
    pub async fn dlq(&self, message_id: &str, job: &QueueJob, error: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        let payload = serde_json::to_string(job)?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await?;

        warn!(job_id = %job.job_id(), error = %error, "Moved job to DLQ");
        Ok(())
    }

    /// Get queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        Ok(conn.xlen(&self.config.stream_name).await?)
    }

    /// Get DLQ length.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        Ok(conn.xlen(&self.config.dlq_stream_name).await?)
    }

    /// Read new messages for `consumer_name`, blocking up to `block_ms`.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueJob)>> {
        let mut conn = self.connection().await?;

        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let entries = reply
            .map(|r| r.keys.into_iter().flat_map(|k| k.ids).collect())
            .unwrap_or_default();
        Ok(self.decode_entries(entries).await)
    }

    /// Claim messages other consumers left pending for longer than `min_idle`.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        min_idle: Duration,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueJob)>> {
        let mut conn = self.connection().await?;

        let pending: StreamPendingCountReply = conn
            .xpending_count(&self.config.stream_name, &self.config.consumer_group, "-", "+", count)
            .await?;

        let stale: Vec<String> = pending
            .ids
            .into_iter()
            .filter(|p| p.last_delivered_ms as u128 >= min_idle.as_millis())
            .map(|p| p.id)
            .collect();
        if stale.is_empty() {
            return Ok(Vec::new());
        }

        let claimed: StreamClaimReply = conn
            .xclaim(
                &self.config.stream_name,
                &self.config.consumer_group,
                consumer_name,
                min_idle.as_millis() as u64,
                &stale[..],
            )
            .await?;

        let jobs = self.decode_entries(claimed.ids).await;
        for (message_id, job) in &jobs {
            info!(job_id = %job.job_id(), message_id = %message_id, "Claimed pending job");
        }
        Ok(jobs)
    }

    /// Parse stream entries, acking malformed payloads so they are not redelivered.
    async fn decode_entries(&self, entries: Vec<StreamId>) -> Vec<(String, QueueJob)> {
        let mut jobs = Vec::with_capacity(entries.len());
        for entry in entries {
            let parsed = entry
                .get::<String>("job")
                .ok_or_else(|| "missing job field".to_string())
                .and_then(|p| serde_json::from_str::<QueueJob>(&p).map_err(|e| e.to_string()));

            match parsed {
                Ok(job) => jobs.push((entry.id, job)),
                Err(e) => {
                    warn!(message_id = %entry.id, error = %e, "Dropping malformed queue message");
                    if let Err(ack_err) = self.ack(&entry.id).await {
                        warn!(message_id = %entry.id, error = %ack_err, "Failed to ack malformed message");
                    }
                }
            }
        }
        jobs
    }

    /// Increment the delivery count for a message.
    pub async fn increment_retry(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.connection().await?;

        let key = self.config.retry_key(message_id);
        let count: u32 = conn.incr(&key, 1).await?;
        conn.expire::<_, ()>(&key, 86400).await?;
        Ok(count)
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        std::env::remove_var("QUEUE_STREAM");
        std::env::remove_var("QUEUE_MAX_RETRIES");
        std::env::set_var("QUEUE_VISIBILITY_TIMEOUT", "30");
        let config = QueueConfig::from_env();
        assert_eq!(config.stream_name, "vingest:acquisitions");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.visibility_timeout, Duration::from_secs(30));
        std::env::remove_var("QUEUE_VISIBILITY_TIMEOUT");
    }

    #[test]
    fn test_key_layout() {
        let config = QueueConfig::default();
        assert_eq!(config.dedup_key("acquire:j1"), "vingest:acquisitions:dedup:acquire:j1");
        assert_eq!(config.retry_key("1-0"), "vingest:acquisitions:retry:1-0");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let err = JobQueue::new(QueueConfig {
            redis_url: "not a url".into(),
            ..QueueConfig::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, QueueError::Redis(_)));
        assert!(!err.is_retryable());
    }
}
