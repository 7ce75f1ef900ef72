//! The processing queue: one row per normalized blog URL.
//!
//! Every mutation here is a single conditional statement so concurrent
//! callers can never observe a half-applied transition. The lease is the
//! classic sort-by-oldest find-and-modify, done with `FOR UPDATE SKIP
//! LOCKED` so workers never block each other.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{QueueEntry, QueueStats, QueueStatus};

const QUEUE_COLUMNS: &str = "url, publisher_id, status, attempt_count, current_job_id, \
     worker_id, last_error, error_type, heartbeat_at, heartbeat_interval_seconds, \
     started_at, completed_at, healed, reprocessed_count, last_reprocessed_at, \
     was_previously_completed, created_at, updated_at";

fn entry_from_row(row: &PgRow) -> Result<QueueEntry, sqlx::Error> {
    let status_raw: String = row.get("status");
    let status = QueueStatus::parse(&status_raw).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "status".into(),
        source: format!("unknown queue status '{status_raw}'").into(),
    })?;

    Ok(QueueEntry {
        url: row.get("url"),
        publisher_id: row.get("publisher_id"),
        status,
        attempt_count: row.get("attempt_count"),
        current_job_id: row.get("current_job_id"),
        worker_id: row.get("worker_id"),
        last_error: row.get("last_error"),
        error_type: row.get("error_type"),
        heartbeat_at: row.get("heartbeat_at"),
        heartbeat_interval_seconds: row.get("heartbeat_interval_seconds"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        healed: row.get("healed"),
        reprocessed_count: row.get("reprocessed_count"),
        last_reprocessed_at: row.get("last_reprocessed_at"),
        was_previously_completed: row.get("was_previously_completed"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Extra fields applied alongside a status transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionUpdate {
    pub last_error: Option<String>,
    pub error_type: Option<String>,
    /// Stamp `completed_at = now()` (terminal transitions).
    pub set_completed_at: bool,
    pub healed: Option<bool>,
    pub was_previously_completed: Option<bool>,
    /// Null out `worker_id` and `heartbeat_at`.
    pub clear_worker: bool,
}

impl TransitionUpdate {
    /// Update for a terminal transition with an error attached.
    pub fn failure(error: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            last_error: Some(error.into()),
            error_type: Some(error_type.into()),
            set_completed_at: true,
            clear_worker: true,
            ..Self::default()
        }
    }

    /// Update for a successful terminal transition.
    pub fn success() -> Self {
        Self {
            set_completed_at: true,
            clear_worker: true,
            ..Self::default()
        }
    }
}

pub async fn get_by_url(pool: &PgPool, url: &str) -> Result<Option<QueueEntry>, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {QUEUE_COLUMNS} FROM processing_queue WHERE url = $1"
    ))
    .bind(url)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(entry_from_row).transpose().map_err(Into::into)
}

pub async fn get_by_job_id(pool: &PgPool, job_id: Uuid) -> Result<Option<QueueEntry>, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {QUEUE_COLUMNS} FROM processing_queue WHERE current_job_id = $1"
    ))
    .bind(job_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(entry_from_row).transpose().map_err(Into::into)
}

/// Atomically get the existing entry for a URL or create a fresh queued one.
///
/// Returns `(entry, created)`. The unique key on `url` decides the race:
/// the loser of a concurrent insert gets the winner's row back.
pub async fn get_or_create(
    pool: &PgPool,
    url: &str,
    publisher_id: Uuid,
) -> Result<(QueueEntry, bool), StoreError> {
    let inserted = sqlx::query(&format!(
        "INSERT INTO processing_queue (url, publisher_id, status) VALUES ($1, $2, 'queued') \
         ON CONFLICT (url) DO NOTHING \
         RETURNING {QUEUE_COLUMNS}"
    ))
    .bind(url)
    .bind(publisher_id)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = inserted {
        info!("Created queue entry for {}", url);
        return Ok((entry_from_row(&row)?, true));
    }

    let existing = get_by_url(pool, url).await?.ok_or_else(|| {
        // Lost the insert race and the winner's row vanished in between;
        // callers treat this as any other conflict and re-read.
        StoreError::Conflict(format!("queue entry for {url} disappeared during get_or_create"))
    })?;
    debug!(
        "Queue entry already exists for {} (status {})",
        url,
        existing.status.as_str()
    );
    Ok((existing, false))
}

/// Conditionally transition an entry's status.
///
/// Returns the updated entry, or `None` when `from_status` no longer held.
pub async fn transition(
    pool: &PgPool,
    url: &str,
    from_status: Option<QueueStatus>,
    to_status: QueueStatus,
    update: TransitionUpdate,
) -> Result<Option<QueueEntry>, StoreError> {
    let row = sqlx::query(&format!(
        "UPDATE processing_queue SET \
         status = $2, \
         updated_at = now(), \
         last_error = COALESCE($3, last_error), \
         error_type = COALESCE($4, error_type), \
         completed_at = CASE WHEN $5 THEN now() ELSE completed_at END, \
         healed = COALESCE($6, healed), \
         was_previously_completed = COALESCE($7, was_previously_completed), \
         worker_id = CASE WHEN $8 THEN NULL ELSE worker_id END, \
         heartbeat_at = CASE WHEN $8 THEN NULL ELSE heartbeat_at END \
         WHERE url = $1 AND ($9::text IS NULL OR status = $9) \
         RETURNING {QUEUE_COLUMNS}"
    ))
    .bind(url)
    .bind(to_status.as_str())
    .bind(&update.last_error)
    .bind(&update.error_type)
    .bind(update.set_completed_at)
    .bind(update.healed)
    .bind(update.was_previously_completed)
    .bind(update.clear_worker)
    .bind(from_status.map(|s| s.as_str()))
    .fetch_optional(pool)
    .await?;

    match &row {
        Some(_) => info!(
            "Queue transition {}: {} → {}",
            url,
            from_status.map(|s| s.as_str()).unwrap_or("any"),
            to_status.as_str(),
        ),
        None => warn!(
            "Queue transition refused for {} (expected {}, target {})",
            url,
            from_status.map(|s| s.as_str()).unwrap_or("any"),
            to_status.as_str(),
        ),
    }

    row.as_ref().map(entry_from_row).transpose().map_err(Into::into)
}

/// Requeue a failed entry for reprocessing. Only succeeds while the current
/// status is `failed`. Assigns a fresh job id; optionally resets the attempt
/// counter and bumps the reprocess bookkeeping.
pub async fn requeue_failed(
    pool: &PgPool,
    url: &str,
    reset_attempts: bool,
    healed: bool,
) -> Result<Option<QueueEntry>, StoreError> {
    let job_id = Uuid::new_v4();
    let row = sqlx::query(&format!(
        "UPDATE processing_queue SET \
         status = 'queued', \
         updated_at = now(), \
         current_job_id = $2, \
         last_error = NULL, \
         error_type = NULL, \
         started_at = NULL, \
         completed_at = NULL, \
         worker_id = NULL, \
         heartbeat_at = NULL, \
         healed = healed OR $4, \
         attempt_count = CASE WHEN $3 THEN 0 ELSE attempt_count END, \
         reprocessed_count = CASE WHEN $3 THEN reprocessed_count + 1 ELSE reprocessed_count END, \
         last_reprocessed_at = CASE WHEN $3 THEN now() ELSE last_reprocessed_at END \
         WHERE url = $1 AND status = 'failed' \
         RETURNING {QUEUE_COLUMNS}"
    ))
    .bind(url)
    .bind(job_id)
    .bind(reset_attempts)
    .bind(healed)
    .fetch_optional(pool)
    .await?;

    match &row {
        Some(_) => info!("Requeued failed entry {}", url),
        None => warn!("Cannot requeue {} (not in failed state)", url),
    }

    row.as_ref().map(entry_from_row).transpose().map_err(Into::into)
}

/// Requeue a completed entry for a deliberate reprocess.
pub async fn requeue_completed(pool: &PgPool, url: &str) -> Result<Option<QueueEntry>, StoreError> {
    let job_id = Uuid::new_v4();
    let row = sqlx::query(&format!(
        "UPDATE processing_queue SET \
         status = 'queued', \
         updated_at = now(), \
         current_job_id = $2, \
         last_error = NULL, \
         error_type = NULL, \
         started_at = NULL, \
         completed_at = NULL, \
         worker_id = NULL, \
         heartbeat_at = NULL, \
         attempt_count = 0, \
         was_previously_completed = TRUE, \
         reprocessed_count = reprocessed_count + 1, \
         last_reprocessed_at = now() \
         WHERE url = $1 AND status = 'completed' \
         RETURNING {QUEUE_COLUMNS}"
    ))
    .bind(url)
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    if row.is_some() {
        info!("Requeued completed entry {} for reprocess", url);
    }
    row.as_ref().map(entry_from_row).transpose().map_err(Into::into)
}

/// Admit a queued entry by assigning its job id.
///
/// Entries created below the request threshold carry no job id and are
/// invisible to [`worker_lease`] until admission.
pub async fn assign_job_id(pool: &PgPool, url: &str) -> Result<Option<QueueEntry>, StoreError> {
    let job_id = Uuid::new_v4();
    let row = sqlx::query(&format!(
        "UPDATE processing_queue SET current_job_id = $2, updated_at = now() \
         WHERE url = $1 AND status = 'queued' AND current_job_id IS NULL \
         RETURNING {QUEUE_COLUMNS}"
    ))
    .bind(url)
    .bind(job_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(entry_from_row).transpose().map_err(Into::into)
}

/// Atomically lease the oldest admitted queued/retry entry for a worker.
///
/// Single-winner: the `FOR UPDATE SKIP LOCKED` sub-select means two workers
/// can never be handed the same row, and neither ever waits on the other.
/// FIFO by `created_at`, tie-broken deterministically by `url`.
pub async fn worker_lease(
    pool: &PgPool,
    worker_id: &str,
) -> Result<Option<QueueEntry>, StoreError> {
    let row = sqlx::query(&format!(
        "UPDATE processing_queue SET \
         status = 'processing', \
         worker_id = $1, \
         started_at = now(), \
         heartbeat_at = now(), \
         updated_at = now(), \
         attempt_count = attempt_count + 1 \
         WHERE url = ( \
             SELECT url FROM processing_queue \
             WHERE status IN ('queued', 'retry') AND current_job_id IS NOT NULL \
             ORDER BY created_at, url \
             LIMIT 1 \
             FOR UPDATE SKIP LOCKED \
         ) \
         RETURNING {QUEUE_COLUMNS}"
    ))
    .bind(worker_id)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = &row {
        let url: String = row.get("url");
        let attempt: i32 = row.get("attempt_count");
        info!("Worker {} leased {} (attempt {})", worker_id, url, attempt);
    }

    row.as_ref().map(entry_from_row).transpose().map_err(Into::into)
}

/// Refresh the heartbeat on a leased entry. Only the owning worker can.
pub async fn heartbeat(pool: &PgPool, url: &str, worker_id: &str) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "UPDATE processing_queue SET heartbeat_at = now() \
         WHERE url = $1 AND status = 'processing' AND worker_id = $2",
    )
    .bind(url)
    .bind(worker_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Rollback helper: delete an entry only while it is still queued, so a row
/// a worker has leased is never pulled out from under it.
pub async fn delete_if_queued(pool: &PgPool, url: &str) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM processing_queue WHERE url = $1 AND status = 'queued'")
        .bind(url)
        .execute(pool)
        .await?;
    let deleted = result.rows_affected() > 0;
    if deleted {
        info!("Rolled back queue entry for {}", url);
    } else {
        warn!("Could not roll back {} (no longer queued)", url);
    }
    Ok(deleted)
}

/// Move `processing` entries with expired heartbeats back to `retry`.
///
/// An entry is stale once its heartbeat is older than three intervals; the
/// multiplier keeps slow-but-alive workers from being preempted. Returns the
/// reclaimed URLs.
pub async fn reclaim_stale(pool: &PgPool) -> Result<Vec<String>, StoreError> {
    let rows = sqlx::query(
        "UPDATE processing_queue SET \
         status = 'retry', \
         updated_at = now(), \
         last_error = 'heartbeat expired; reclaimed from worker ' || COALESCE(worker_id, '?'), \
         error_type = 'STALE_HEARTBEAT', \
         worker_id = NULL, \
         heartbeat_at = NULL \
         WHERE status = 'processing' \
         AND heartbeat_at < now() - make_interval(secs => heartbeat_interval_seconds * 3) \
         RETURNING url",
    )
    .fetch_all(pool)
    .await?;

    let urls: Vec<String> = rows.iter().map(|r| r.get("url")).collect();
    for url in &urls {
        warn!("Reclaimed stale processing entry {}", url);
    }
    Ok(urls)
}

/// Queue entries for one publisher, newest first, optionally filtered by
/// status. Reporting only.
pub async fn list_for_publisher(
    pool: &PgPool,
    publisher_id: Uuid,
    status: Option<QueueStatus>,
    limit: i64,
) -> Result<Vec<QueueEntry>, StoreError> {
    let rows = sqlx::query(&format!(
        "SELECT {QUEUE_COLUMNS} FROM processing_queue \
         WHERE publisher_id = $1 AND ($2::text IS NULL OR status = $2) \
         ORDER BY updated_at DESC LIMIT $3"
    ))
    .bind(publisher_id)
    .bind(status.map(|s| s.as_str()))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.iter().map(entry_from_row).collect::<Result<_, _>>().map_err(Into::into)
}

/// Counts per status for the admin stats endpoint.
pub async fn stats(pool: &PgPool) -> Result<QueueStats, StoreError> {
    let rows = sqlx::query(
        "SELECT status, COUNT(*) AS count FROM processing_queue GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    let mut stats = QueueStats::default();
    for row in rows {
        let status: String = row.get("status");
        let count: i64 = row.get("count");
        match QueueStatus::parse(&status) {
            Some(QueueStatus::Queued) => stats.queued = count,
            Some(QueueStatus::Processing) => stats.processing = count,
            Some(QueueStatus::Retry) => stats.retry = count,
            Some(QueueStatus::Completed) => stats.completed = count,
            Some(QueueStatus::Failed) => stats.failed = count,
            None => {}
        }
        stats.total += count;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_update_sets_terminal_fields() {
        let update = TransitionUpdate::failure("boom", "CRAWL_CLIENT_ERROR");
        assert_eq!(update.last_error.as_deref(), Some("boom"));
        assert_eq!(update.error_type.as_deref(), Some("CRAWL_CLIENT_ERROR"));
        assert!(update.set_completed_at);
        assert!(update.clear_worker);
        assert!(update.healed.is_none());
    }

    #[test]
    fn success_update_carries_no_error() {
        let update = TransitionUpdate::success();
        assert!(update.last_error.is_none());
        assert!(update.error_type.is_none());
        assert!(update.set_completed_at);
        assert!(update.clear_worker);
    }

    #[test]
    fn default_update_is_inert() {
        let update = TransitionUpdate::default();
        assert!(!update.set_completed_at);
        assert!(!update.clear_worker);
        assert!(update.last_error.is_none());
    }
}
