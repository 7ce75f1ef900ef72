mod error;
mod metrics;
mod orchestrator;
mod runtime;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::metrics::WorkerMetrics;
use crate::runtime::WorkerRuntime;

/// Blog processing worker: polls the queue, runs crawl → LLM → embeddings,
/// and persists the results.
#[derive(Debug, Parser)]
#[command(name = "blogqa-worker", version)]
struct Args {
    /// Seconds between empty polls.
    #[arg(long, env = "WORKER_POLL_INTERVAL_SECONDS")]
    poll_interval: Option<u64>,

    /// Number of jobs processed concurrently.
    #[arg(long, env = "WORKER_CONCURRENT_JOBS")]
    concurrent_jobs: Option<usize>,

    /// Port for the Prometheus metrics listener.
    #[arg(long, env = "WORKER_METRICS_PORT")]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    blogqa_core::config::load_dotenv();
    let mut config = blogqa_core::Config::from_env()?;
    if let Some(poll) = args.poll_interval {
        config.worker.poll_interval_seconds = poll;
    }
    if let Some(jobs) = args.concurrent_jobs {
        config.worker.concurrent_jobs = jobs;
    }
    if let Some(port) = args.metrics_port {
        config.worker.metrics_port = port;
    }
    config.log_summary();

    let pool = blogqa_store::db::init_pool(&config.postgres).await?;

    let worker_metrics = Arc::new(WorkerMetrics::new());
    let metrics_port = config.worker.metrics_port;
    let metrics_for_server = worker_metrics.clone();
    tokio::spawn(async move {
        if let Err(e) = metrics::serve_metrics(metrics_for_server, metrics_port).await {
            warn!("Metrics server failed: {}", e);
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received; finishing in-flight jobs");
        shutdown_tx.send(true).ok();
    });

    WorkerRuntime::new(pool, config, worker_metrics, shutdown_rx)
        .run()
        .await;

    info!("Worker shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
