//! The polling worker runtime.
//!
//! One poll loop per process plus up to `concurrent_jobs` in-flight
//! orchestrations. The loop stops on shutdown; in-flight jobs run to their
//! own terminal transition before the process exits.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use blogqa_core::Config;
use blogqa_crawler::Crawler;
use blogqa_store::{audit, publisher, queue, AuditStatus, NewAuditEntry, Publisher, QueueEntry, QueueStatus, TransitionUpdate};

use crate::error::ProcessError;
use crate::metrics::WorkerMetrics;
use crate::orchestrator::{self, ProcessOutcome};

/// Stable-enough worker identity: host, pid, and a random suffix.
pub fn make_worker_id() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "worker".to_string());
    let pid = std::process::id();
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{host}-{pid}-{}", &random[..6])
}

pub struct WorkerRuntime {
    pool: PgPool,
    config: Config,
    worker_id: String,
    crawler: Arc<Crawler>,
    metrics: Arc<WorkerMetrics>,
    shutdown: watch::Receiver<bool>,
}

impl WorkerRuntime {
    pub fn new(
        pool: PgPool,
        config: Config,
        metrics: Arc<WorkerMetrics>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let crawler = Arc::new(Crawler::new(&config.crawler));
        let worker_id = make_worker_id();
        info!(
            "Worker {} initialized (poll {}s, {} concurrent)",
            worker_id, config.worker.poll_interval_seconds, config.worker.concurrent_jobs,
        );
        Self {
            pool,
            config,
            worker_id,
            crawler,
            metrics,
            shutdown,
        }
    }

    /// Sleep for the poll interval, waking early on shutdown.
    async fn idle_wait(&mut self) {
        let interval = Duration::from_secs(self.config.worker.poll_interval_seconds);
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = self.shutdown.changed() => {}
        }
    }

    pub async fn run(mut self) {
        // Housekeeping: reclaim entries whose workers stopped heartbeating.
        let reclaimer = tokio::spawn(reclaim_loop(
            self.pool.clone(),
            self.metrics.clone(),
            self.shutdown.clone(),
        ));

        let semaphore = Arc::new(Semaphore::new(self.config.worker.concurrent_jobs.max(1)));
        let mut tasks: JoinSet<()> = JoinSet::new();

        info!("Worker {} polling", self.worker_id);

        while !*self.shutdown.borrow() {
            // Reap finished job tasks without blocking the poll.
            while tasks.try_join_next().is_some() {}

            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
                _ = self.shutdown.changed() => break,
            };

            self.metrics.poll_iterations_total.inc();
            match queue::worker_lease(&self.pool, &self.worker_id).await {
                Ok(Some(entry)) => {
                    let ctx = JobContext {
                        pool: self.pool.clone(),
                        config: self.config.clone(),
                        crawler: self.crawler.clone(),
                        metrics: self.metrics.clone(),
                        worker_id: self.worker_id.clone(),
                    };
                    tasks.spawn(async move {
                        process_leased(ctx, entry).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    self.idle_wait().await;
                }
                Err(e) => {
                    self.metrics.poll_errors_total.inc();
                    error!("Poll error: {}", e);
                    drop(permit);
                    self.idle_wait().await;
                }
            }
        }

        info!("Worker {} draining {} in-flight jobs", self.worker_id, tasks.len());
        while tasks.join_next().await.is_some() {}
        reclaimer.abort();
        info!("Worker {} stopped", self.worker_id);
    }
}

struct JobContext {
    pool: PgPool,
    config: Config,
    crawler: Arc<Crawler>,
    metrics: Arc<WorkerMetrics>,
    worker_id: String,
}

async fn process_leased(ctx: JobContext, entry: QueueEntry) {
    ctx.metrics.jobs_active.inc();
    let started = Instant::now();

    let publisher = match publisher::get_by_id(&ctx.pool, entry.publisher_id).await {
        Ok(Some(p)) => Some(p),
        Ok(None) => None,
        Err(e) => {
            // Can't even load the publisher; surface as a store failure.
            finish_failure(&ctx, &entry, None, ProcessError::Store(e)).await;
            ctx.metrics.jobs_active.dec();
            return;
        }
    };

    let Some(publisher) = publisher else {
        finish_failure(
            &ctx,
            &entry,
            None,
            ProcessError::PublisherMissing(entry.publisher_id),
        )
        .await;
        ctx.metrics.jobs_active.dec();
        return;
    };

    // Liveness: heartbeat at half the entry's interval until terminal.
    let heartbeat = tokio::spawn(heartbeat_loop(
        ctx.pool.clone(),
        entry.url.clone(),
        ctx.worker_id.clone(),
        entry.heartbeat_interval_seconds,
    ));

    let result =
        orchestrator::process_entry(&ctx.pool, &ctx.config, &ctx.crawler, &entry, &publisher).await;
    heartbeat.abort();

    match result {
        Ok(outcome) => finish_success(&ctx, &entry, &publisher, outcome).await,
        Err(e) => finish_failure(&ctx, &entry, Some(&publisher), e).await,
    }

    ctx.metrics.jobs_active.dec();
    ctx.metrics
        .job_duration_seconds
        .observe(started.elapsed().as_secs_f64());
}

async fn heartbeat_loop(pool: PgPool, url: String, worker_id: String, interval_seconds: i32) {
    let interval = Duration::from_secs((interval_seconds.max(2) as u64) / 2);
    loop {
        tokio::time::sleep(interval).await;
        match queue::heartbeat(&pool, &url, &worker_id).await {
            Ok(true) => {}
            Ok(false) => {
                // Lease gone (reclaimed or finished); nothing left to beat.
                warn!("Heartbeat rejected for {}; stopping", url);
                break;
            }
            Err(e) => warn!("Heartbeat error for {}: {}", url, e),
        }
    }
}

async fn reclaim_loop(pool: PgPool, metrics: Arc<WorkerMetrics>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(30)) => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
        match queue::reclaim_stale(&pool).await {
            Ok(urls) if !urls.is_empty() => {
                metrics.entries_reclaimed_total.inc_by(urls.len() as u64);
            }
            Ok(_) => {}
            Err(e) => warn!("Stale reclamation failed: {}", e),
        }
    }
}

async fn finish_success(
    ctx: &JobContext,
    entry: &QueueEntry,
    publisher: &Publisher,
    outcome: ProcessOutcome,
) {
    let transitioned = queue::transition(
        &ctx.pool,
        &entry.url,
        Some(QueueStatus::Processing),
        QueueStatus::Completed,
        TransitionUpdate::success(),
    )
    .await;

    let updated = match transitioned {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            // Another actor (reclaimer) took the entry back; its next run
            // owns the terminal bookkeeping, so write nothing here.
            warn!("Lost lease on {} before completion; skipping audit", entry.url);
            return;
        }
        Err(e) => {
            error!("Terminal transition failed for {}: {}", entry.url, e);
            return;
        }
    };

    let now = Utc::now();
    let record = NewAuditEntry {
        url: entry.url.clone(),
        publisher_id: entry.publisher_id,
        job_id: entry.current_job_id,
        worker_id: ctx.worker_id.clone(),
        status: AuditStatus::Completed,
        attempt_number: updated.attempt_count,
        started_at: entry.started_at.unwrap_or(now),
        completed_at: updated.completed_at.unwrap_or(now),
        question_count: Some(outcome.question_count),
        summary_length: Some(outcome.summary_length),
        embedding_count: Some(outcome.embedding_count),
        error_message: None,
        error_type: None,
        error_stack_trace: None,
        blog_title: Some(outcome.blog_title.clone()),
        content_length: Some(outcome.content_length),
        llm_model: Some(publisher.config.llm_model.clone()),
        embedding_model: Some(publisher.config.embedding_model.clone()),
        publisher_config: serde_json::to_value(&publisher.config).ok(),
        is_reprocess: entry.was_previously_completed || entry.reprocessed_count > 0,
        reprocess_reason: entry.healed.then(|| "healed inconsistent entry".to_string()),
    };
    if let Err(e) = audit::append(&ctx.pool, &record).await {
        error!("Audit append failed for {}: {}", entry.url, e);
    }

    if let Err(e) = publisher::release_blog_slot(&ctx.pool, entry.publisher_id, true).await {
        error!("Slot release failed for publisher {}: {}", entry.publisher_id, e);
    }

    ctx.metrics
        .jobs_processed_total
        .with_label_values(&["completed"])
        .inc();
}

/// Retry while the error is transient and the attempt budget allows it.
fn should_retry(err: &ProcessError, attempt_count: i32, max_retries: i32) -> bool {
    err.is_retryable() && attempt_count < max_retries
}

async fn finish_failure(
    ctx: &JobContext,
    entry: &QueueEntry,
    publisher: Option<&Publisher>,
    err: ProcessError,
) {
    let max_retries = ctx.config.worker.max_retries as i32;
    let retry = should_retry(&err, entry.attempt_count, max_retries);

    warn!(
        "Processing {} failed on attempt {}/{} ({}): {}",
        entry.url,
        entry.attempt_count,
        max_retries,
        if retry { "will retry" } else { "terminal" },
        err,
    );

    let transitioned = if retry {
        queue::transition(
            &ctx.pool,
            &entry.url,
            Some(QueueStatus::Processing),
            QueueStatus::Retry,
            TransitionUpdate {
                last_error: Some(err.to_string()),
                error_type: Some(err.error_type().to_string()),
                clear_worker: true,
                ..TransitionUpdate::default()
            },
        )
        .await
    } else {
        queue::transition(
            &ctx.pool,
            &entry.url,
            Some(QueueStatus::Processing),
            QueueStatus::Failed,
            TransitionUpdate::failure(err.to_string(), err.error_type()),
        )
        .await
    };

    match transitioned {
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!("Lost lease on {} during failure handling", entry.url);
            return;
        }
        Err(e) => {
            error!("Failure transition failed for {}: {}", entry.url, e);
            return;
        }
    }

    let now = Utc::now();
    let record = NewAuditEntry {
        url: entry.url.clone(),
        publisher_id: entry.publisher_id,
        job_id: entry.current_job_id,
        worker_id: ctx.worker_id.clone(),
        status: AuditStatus::Failed,
        attempt_number: entry.attempt_count,
        started_at: entry.started_at.unwrap_or(now),
        completed_at: now,
        question_count: None,
        summary_length: None,
        embedding_count: None,
        error_message: Some(err.to_string()),
        error_type: Some(err.error_type().to_string()),
        error_stack_trace: Some(format!("{err:?}")),
        blog_title: None,
        content_length: None,
        llm_model: publisher.map(|p| p.config.llm_model.clone()),
        embedding_model: publisher.map(|p| p.config.embedding_model.clone()),
        publisher_config: publisher.and_then(|p| serde_json::to_value(&p.config).ok()),
        is_reprocess: entry.was_previously_completed || entry.reprocessed_count > 0,
        reprocess_reason: entry.healed.then(|| "healed inconsistent entry".to_string()),
    };
    if let Err(e) = audit::append(&ctx.pool, &record).await {
        error!("Audit append failed for {}: {}", entry.url, e);
    }

    // The slot reserved at admission comes back only on terminal failure;
    // a retry keeps the reservation for the next attempt.
    if !retry {
        if let Err(e) = publisher::release_blog_slot(&ctx.pool, entry.publisher_id, false).await {
            error!("Slot release failed for publisher {}: {}", entry.publisher_id, e);
        }
    }

    ctx.metrics
        .jobs_processed_total
        .with_label_values(&[if retry { "retry" } else { "failed" }])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogqa_crawler::CrawlError;
    use blogqa_llm::LlmError;

    fn server_error() -> ProcessError {
        ProcessError::Crawl(CrawlError::Status {
            status: 503,
            url: "https://example.com/busy".into(),
        })
    }

    #[test]
    fn transient_errors_retry_until_the_cap() {
        assert!(should_retry(&server_error(), 1, 3));
        assert!(should_retry(&server_error(), 2, 3));
        assert!(!should_retry(&server_error(), 3, 3));
        assert!(!should_retry(&server_error(), 4, 3));
    }

    #[test]
    fn fatal_errors_never_retry() {
        let not_found = ProcessError::Crawl(CrawlError::Status {
            status: 404,
            url: "https://example.com/gone".into(),
        });
        assert!(!should_retry(&not_found, 1, 3));

        let refusal = ProcessError::Llm(LlmError::ApiError {
            status: 400,
            body: "content policy".into(),
        });
        assert!(!should_retry(&refusal, 1, 3));
    }

    #[test]
    fn worker_ids_are_unique_and_structured() {
        let a = make_worker_id();
        let b = make_worker_id();
        assert_ne!(a, b);
        assert!(a.contains(&std::process::id().to_string()));
    }
}
