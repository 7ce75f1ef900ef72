//! Prometheus metrics for the worker, served on a standalone port.

use std::sync::Arc;

use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tracing::{info, warn};

pub struct WorkerMetrics {
    pub registry: Registry,
    pub poll_iterations_total: IntCounter,
    pub poll_errors_total: IntCounter,
    pub jobs_processed_total: IntCounterVec,
    pub job_duration_seconds: Histogram,
    pub jobs_active: IntGauge,
    pub entries_reclaimed_total: IntCounter,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let poll_iterations_total = IntCounter::new(
            "worker_poll_iterations_total",
            "Poll loop iterations",
        )
        .expect("valid metric opts");
        let poll_errors_total =
            IntCounter::new("worker_poll_errors_total", "Poll loop errors").expect("valid metric opts");
        let jobs_processed_total = IntCounterVec::new(
            Opts::new(
                "worker_jobs_processed_total",
                "Jobs finished by terminal outcome (completed, retry, failed)",
            ),
            &["outcome"],
        )
        .expect("valid metric opts");
        let job_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "worker_job_duration_seconds",
            "End-to-end processing time per job",
        ))
        .expect("valid metric opts");
        let jobs_active =
            IntGauge::new("worker_jobs_active", "Jobs currently processing").expect("valid metric opts");
        let entries_reclaimed_total = IntCounter::new(
            "worker_entries_reclaimed_total",
            "Stale processing entries moved back to retry",
        )
        .expect("valid metric opts");

        for collector in [
            Box::new(poll_iterations_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(poll_errors_total.clone()),
            Box::new(jobs_processed_total.clone()),
            Box::new(job_duration_seconds.clone()),
            Box::new(jobs_active.clone()),
            Box::new(entries_reclaimed_total.clone()),
        ] {
            if let Err(e) = registry.register(collector) {
                warn!("Failed to register worker metric: {}", e);
            }
        }

        Self {
            registry,
            poll_iterations_total,
            poll_errors_total,
            jobs_processed_total,
            job_duration_seconds,
            jobs_active,
            entries_reclaimed_total,
        }
    }

    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            warn!("Failed to encode worker metrics: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for WorkerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serve `/metrics` for Prometheus scrapes. Runs until the process exits.
pub async fn serve_metrics(metrics: Arc<WorkerMetrics>, port: u16) -> anyhow::Result<()> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let metrics = metrics.clone();
            async move {
                (
                    [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                    metrics.render(),
                )
                    .into_response()
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Worker metrics listening on :{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_worker_metrics() {
        let metrics = WorkerMetrics::new();
        metrics.poll_iterations_total.inc();
        metrics
            .jobs_processed_total
            .with_label_values(&["completed"])
            .inc();
        metrics.job_duration_seconds.observe(12.5);

        let text = metrics.render();
        assert!(text.contains("worker_poll_iterations_total 1"));
        assert!(text.contains("outcome=\"completed\""));
        assert!(text.contains("worker_job_duration_seconds_count"));
    }
}
