//! Video acquisition worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vingest_queue::JobQueue;
use vingest_worker::bootstrap::build_orchestrator;
use vingest_worker::metrics::install_exporter;
use vingest_worker::{EnvironmentConfig, JobExecutor, WorkerConfig};

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,vingest=debug"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("rustls crypto provider already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting vingest-worker");

    let config = WorkerConfig::from_env();
    let env = EnvironmentConfig::from_env();
    info!(?config, ?env, "Worker configuration");

    if let Some(port) = config.metrics_port {
        match install_exporter(port) {
            Ok(()) => info!(port, "Prometheus exporter listening"),
            Err(e) => {
                error!("Failed to install Prometheus exporter: {}", e);
                std::process::exit(1);
            }
        }
    }

    let orchestrator = match build_orchestrator(&config, &env).await {
        Ok(o) => Arc::new(o),
        Err(e) => {
            error!("Failed to build orchestrator: {}", e);
            std::process::exit(1);
        }
    };

    let queue = match JobQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    let executor = Arc::new(JobExecutor::new(config, queue, orchestrator));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_executor.shutdown();
        }
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
