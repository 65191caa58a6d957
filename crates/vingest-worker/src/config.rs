//! Worker and environment configuration.

use std::str::FromStr;
use std::time::Duration;

use crate::retry::BackoffPolicy;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    std::env::var(key).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Parent directory of job workspaces
    pub work_dir: String,
    /// Upper bound for a single acquisition attempt
    pub attempt_timeout: Duration,
    /// Backoff between transient acquisition failures
    pub backoff: BackoffPolicy,
    /// Largest acquired file accepted, in bytes
    pub max_file_size: u64,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// How often the worker should scan for orphaned pending messages
    pub claim_interval: Duration,
    /// Minimum idle time before a pending message can be claimed
    pub claim_min_idle: Duration,
    /// Port for the Prometheus exporter; disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            work_dir: "/tmp/vingest".to_string(),
            attempt_timeout: Duration::from_secs(600),
            backoff: BackoffPolicy::default(),
            max_file_size: 500 * 1024 * 1024,
            shutdown_timeout: Duration::from_secs(60),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
            metrics_port: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_jobs: env_or("WORKER_MAX_JOBS", default.max_concurrent_jobs).max(1),
            work_dir: std::env::var("WORKER_WORK_DIR").unwrap_or(default.work_dir),
            attempt_timeout: Duration::from_secs(env_or(
                "WORKER_ATTEMPT_TIMEOUT_SECS",
                default.attempt_timeout.as_secs(),
            )),
            backoff: BackoffPolicy {
                max_attempts: env_or("WORKER_MAX_ATTEMPTS", default.backoff.max_attempts).max(1),
                base_delay: Duration::from_millis(env_or(
                    "WORKER_RETRY_BASE_DELAY_MS",
                    default.backoff.base_delay.as_millis() as u64,
                )),
                max_delay: Duration::from_millis(env_or(
                    "WORKER_RETRY_MAX_DELAY_MS",
                    default.backoff.max_delay.as_millis() as u64,
                )),
            },
            max_file_size: env_or("WORKER_MAX_FILE_SIZE_MB", 500u64).saturating_mul(1024 * 1024),
            shutdown_timeout: Duration::from_secs(env_or(
                "WORKER_SHUTDOWN_TIMEOUT",
                default.shutdown_timeout.as_secs(),
            )),
            claim_interval: Duration::from_secs(env_or(
                "WORKER_CLAIM_INTERVAL_SECS",
                default.claim_interval.as_secs(),
            )),
            claim_min_idle: Duration::from_secs(env_or(
                "WORKER_CLAIM_MIN_IDLE_SECS",
                default.claim_min_idle.as_secs(),
            )),
            metrics_port: std::env::var("METRICS_PORT").ok().and_then(|s| s.parse().ok()),
        }
    }
}

/// Deployment facts the strategy selector decides on.
///
/// Built once at startup and passed explicitly; nothing downstream reads the
/// process environment to pick a strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentConfig {
    /// `USE_MOCK_DOWNLOADER`, when set to a boolean
    pub mock_override: Option<bool>,
    /// Serverless platform without room for heavy binaries
    pub serverless: bool,
    /// Platform known to run heavy binaries
    pub capable_platform: bool,
    /// Local development
    pub development: bool,
    /// `yt-dlp` found on this host
    pub heavy_binary_available: bool,
    /// Base URL of the remote acquisition executor
    pub remote_executor_url: Option<String>,
}

impl EnvironmentConfig {
    /// Read the deployment environment.
    pub fn from_env() -> Self {
        Self {
            mock_override: std::env::var("USE_MOCK_DOWNLOADER")
                .ok()
                .and_then(|v| parse_bool(&v)),
            serverless: env_flag("VERCEL") || env_flag("VERCEL_ENV"),
            capable_platform: env_flag("RAILWAY_ENVIRONMENT")
                || env_flag("RAILWAY_PROJECT_ID")
                || std::env::var("VINGEST_PLATFORM")
                    .map(|p| p.eq_ignore_ascii_case("capable"))
                    .unwrap_or(false),
            development: std::env::var("APP_ENV")
                .map(|v| v.eq_ignore_ascii_case("development"))
                .unwrap_or(false),
            heavy_binary_available: which::which(
                std::env::var("YT_DLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
            )
            .is_ok(),
            remote_executor_url: std::env::var("VINGEST_REMOTE_EXECUTOR_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
        }
    }

    /// Platform that can run the in-process executor.
    pub fn is_capable(&self) -> bool {
        self.capable_platform || self.development
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_KEYS: [&str; 8] = [
        "USE_MOCK_DOWNLOADER",
        "VERCEL",
        "VERCEL_ENV",
        "RAILWAY_ENVIRONMENT",
        "RAILWAY_PROJECT_ID",
        "VINGEST_PLATFORM",
        "APP_ENV",
        "VINGEST_REMOTE_EXECUTOR_URL",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    #[serial]
    fn test_environment_from_env() {
        clear_env();
        let env = EnvironmentConfig::from_env();
        assert_eq!(env.mock_override, None);
        assert!(!env.serverless);
        assert!(!env.is_capable());

        std::env::set_var("USE_MOCK_DOWNLOADER", "false");
        std::env::set_var("VERCEL", "1");
        std::env::set_var("VINGEST_PLATFORM", "Capable");
        std::env::set_var("VINGEST_REMOTE_EXECUTOR_URL", "https://exec.internal");
        let env = EnvironmentConfig::from_env();
        assert_eq!(env.mock_override, Some(false));
        assert!(env.serverless);
        assert!(env.capable_platform);
        assert_eq!(env.remote_executor_url.as_deref(), Some("https://exec.internal"));

        clear_env();
        std::env::set_var("APP_ENV", "development");
        assert!(EnvironmentConfig::from_env().is_capable());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_worker_config_from_env() {
        std::env::set_var("WORKER_MAX_JOBS", "8");
        std::env::set_var("WORKER_MAX_FILE_SIZE_MB", "10");
        std::env::set_var("WORKER_RETRY_BASE_DELAY_MS", "50");
        std::env::remove_var("WORKER_MAX_ATTEMPTS");
        std::env::remove_var("METRICS_PORT");

        let config = WorkerConfig::from_env();
        assert_eq!(config.max_concurrent_jobs, 8);
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.backoff.base_delay, Duration::from_millis(50));
        assert_eq!(config.backoff.max_attempts, 3);
        assert_eq!(config.metrics_port, None);

        std::env::remove_var("WORKER_MAX_JOBS");
        std::env::remove_var("WORKER_MAX_FILE_SIZE_MB");
        std::env::remove_var("WORKER_RETRY_BASE_DELAY_MS");
    }

    #[test]
    #[serial]
    fn test_huge_file_size_saturates() {
        std::env::set_var("WORKER_MAX_FILE_SIZE_MB", u64::MAX.to_string());
        assert_eq!(WorkerConfig::from_env().max_file_size, u64::MAX);
        std::env::remove_var("WORKER_MAX_FILE_SIZE_MB");
    }
}
