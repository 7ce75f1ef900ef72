//! Prometheus metrics for the edge API.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::warn;

pub struct Metrics {
    pub registry: Registry,
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub check_and_load_total: IntCounterVec,
    pub jobs_enqueued_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests by method, path, and status"),
            &["method", "path", "status"],
        )
        .expect("valid metric opts");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency by method and path",
            ),
            &["method", "path"],
        )
        .expect("valid metric opts");

        let check_and_load_total = IntCounterVec::new(
            Opts::new(
                "check_and_load_total",
                "check-and-load calls by resulting processing status",
            ),
            &["status"],
        )
        .expect("valid metric opts");

        let jobs_enqueued_total = IntCounterVec::new(
            Opts::new("jobs_enqueued_total", "Explicit job enqueues by outcome"),
            &["outcome"],
        )
        .expect("valid metric opts");

        for collector in [
            Box::new(http_requests_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(http_request_duration_seconds.clone()),
            Box::new(check_and_load_total.clone()),
            Box::new(jobs_enqueued_total.clone()),
        ] {
            if let Err(e) = registry.register(collector) {
                warn!("Failed to register metric: {}", e);
            }
        }

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            check_and_load_total,
            jobs_enqueued_total,
        }
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_metrics() {
        let metrics = Metrics::new();
        metrics
            .http_requests_total
            .with_label_values(&["GET", "/health", "200"])
            .inc();
        metrics
            .check_and_load_total
            .with_label_values(&["ready"])
            .inc();

        let text = metrics.render();
        assert!(text.contains("http_requests_total"));
        assert!(text.contains("check_and_load_total"));
        assert!(text.contains("status=\"ready\""));
    }

    #[test]
    fn duration_histogram_observes() {
        let metrics = Metrics::new();
        metrics
            .http_request_duration_seconds
            .with_label_values(&["GET", "/api/v1/questions/check-and-load"])
            .observe(0.125);
        let text = metrics.render();
        assert!(text.contains("http_request_duration_seconds_count"));
    }
}
