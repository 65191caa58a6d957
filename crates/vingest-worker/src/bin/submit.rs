//! Submit acquisition jobs.
//!
//! Creates the job record and enqueues it for the worker. With `--inline`,
//! or when no durable job store is configured, the pipeline runs in this
//! process instead.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vingest_models::{JobId, SourceReference};
use vingest_queue::{AcquireVideoJob, JobQueue, QueueJob, RetryAcquisitionJob};
use vingest_worker::bootstrap::build_orchestrator;
use vingest_worker::{EnvironmentConfig, Orchestrator, WorkerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Submit video acquisition jobs", long_about = None)]
struct Cli {
    /// Run the pipeline in this process instead of enqueueing
    #[arg(long, global = true)]
    inline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Acquire a video from a shared URL or bare id
    Url { reference: String },
    /// Register a locally uploaded file
    Upload {
        path: PathBuf,
        /// Original file name shown to users
        #[arg(long)]
        name: Option<String>,
    },
    /// Re-run a job that ended in error
    Retry { job_id: String },
    /// Print the current job record
    Status { job_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("rustls crypto provider already installed");
    }
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = WorkerConfig::from_env();
    let env = EnvironmentConfig::from_env();
    let orchestrator = build_orchestrator(&config, &env)
        .await
        .context("failed to initialise pipeline")?;

    let inline = cli.inline || orchestrator.state().store().backend() == "memory";
    if inline && !cli.inline {
        warn!("Job store is not durable, running inline");
    }

    match cli.command {
        Commands::Url { reference } => submit(&orchestrator, SourceReference::url(reference), inline).await,
        Commands::Upload { path, name } => {
            let path = path
                .canonicalize()
                .with_context(|| format!("cannot read {}", path.display()))?;
            let source = SourceReference::upload(path.to_string_lossy().into_owned(), name);
            submit(&orchestrator, source, inline).await
        }
        Commands::Retry { job_id } => {
            let job_id = JobId::from_string(job_id);
            if inline {
                let outcome = orchestrator.retry_job(&job_id).await;
                print_job(&orchestrator, &job_id).await?;
                outcome.map(|_| ()).context("retry failed")
            } else {
                enqueue(QueueJob::Retry(RetryAcquisitionJob::new(job_id))).await
            }
        }
        Commands::Status { job_id } => print_job(&orchestrator, &JobId::from_string(job_id)).await,
    }
}

async fn submit(orchestrator: &Orchestrator, source: SourceReference, inline: bool) -> Result<()> {
    let job_id = orchestrator.state().create(source).await?;
    info!(job_id = %job_id, "Created job");

    if !inline {
        return enqueue(QueueJob::Acquire(AcquireVideoJob::new(job_id))).await;
    }

    let job = orchestrator.state().get(&job_id).await?;
    let outcome = orchestrator.process(&job).await;
    print_job(orchestrator, &job_id).await?;
    outcome.map(|_| ()).context("acquisition failed")
}

async fn enqueue(job: QueueJob) -> Result<()> {
    let queue = JobQueue::from_env().context("failed to connect to queue")?;
    queue.init().await?;
    let message_id = queue.enqueue(&job).await?;
    println!(
        "{}",
        serde_json::json!({
            "job_id": job.job_id(),
            "kind": job.kind(),
            "message_id": message_id,
        })
    );
    Ok(())
}

async fn print_job(orchestrator: &Orchestrator, job_id: &JobId) -> Result<()> {
    let job = orchestrator.state().get(job_id).await?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}
