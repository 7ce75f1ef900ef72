//! Append-only audit trail of terminal processing attempts.
//!
//! This module exposes exactly one write path. The queries exist for
//! reporting and debugging; nothing on the processing path reads them.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{AuditEntry, AuditStatus, NewAuditEntry};

const AUDIT_COLUMNS: &str = "id, url, publisher_id, job_id, worker_id, status, attempt_number, \
     started_at, completed_at, processing_time_seconds, question_count, summary_length, \
     embedding_count, error_message, error_type, error_stack_trace, blog_title, \
     content_length, llm_model, embedding_model, publisher_config, is_reprocess, \
     reprocess_reason, created_at";

fn audit_from_row(row: &PgRow) -> Result<AuditEntry, sqlx::Error> {
    let status_raw: String = row.get("status");
    let status = AuditStatus::parse(&status_raw).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "status".into(),
        source: format!("unknown audit status '{status_raw}'").into(),
    })?;

    Ok(AuditEntry {
        id: row.get("id"),
        url: row.get("url"),
        publisher_id: row.get("publisher_id"),
        job_id: row.get("job_id"),
        worker_id: row.get("worker_id"),
        status,
        attempt_number: row.get("attempt_number"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        processing_time_seconds: row.get("processing_time_seconds"),
        question_count: row.get("question_count"),
        summary_length: row.get("summary_length"),
        embedding_count: row.get("embedding_count"),
        error_message: row.get("error_message"),
        error_type: row.get("error_type"),
        error_stack_trace: row.get("error_stack_trace"),
        blog_title: row.get("blog_title"),
        content_length: row.get("content_length"),
        llm_model: row.get("llm_model"),
        embedding_model: row.get("embedding_model"),
        publisher_config: row.get("publisher_config"),
        is_reprocess: row.get("is_reprocess"),
        reprocess_reason: row.get("reprocess_reason"),
        created_at: row.get("created_at"),
    })
}

/// Append one audit entry. There is no update or delete.
pub async fn append(pool: &PgPool, entry: &NewAuditEntry) -> Result<Uuid, StoreError> {
    let id = Uuid::new_v4();
    let processing_time = (entry.completed_at - entry.started_at).num_milliseconds() as f64 / 1000.0;

    sqlx::query(
        "INSERT INTO processing_audit (id, url, publisher_id, job_id, worker_id, status, \
         attempt_number, started_at, completed_at, processing_time_seconds, question_count, \
         summary_length, embedding_count, error_message, error_type, error_stack_trace, \
         blog_title, content_length, llm_model, embedding_model, publisher_config, \
         is_reprocess, reprocess_reason) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
         $17, $18, $19, $20, $21, $22, $23)",
    )
    .bind(id)
    .bind(&entry.url)
    .bind(entry.publisher_id)
    .bind(entry.job_id)
    .bind(&entry.worker_id)
    .bind(entry.status.as_str())
    .bind(entry.attempt_number)
    .bind(entry.started_at)
    .bind(entry.completed_at)
    .bind(processing_time)
    .bind(entry.question_count)
    .bind(entry.summary_length)
    .bind(entry.embedding_count)
    .bind(&entry.error_message)
    .bind(&entry.error_type)
    .bind(&entry.error_stack_trace)
    .bind(&entry.blog_title)
    .bind(entry.content_length)
    .bind(&entry.llm_model)
    .bind(&entry.embedding_model)
    .bind(&entry.publisher_config)
    .bind(entry.is_reprocess)
    .bind(&entry.reprocess_reason)
    .execute(pool)
    .await?;

    debug!(
        "Audit appended: {} {} (attempt {})",
        entry.url,
        entry.status.as_str(),
        entry.attempt_number,
    );
    Ok(id)
}

/// Processing history for one URL, newest first.
pub async fn history_for_url(
    pool: &PgPool,
    url: &str,
    limit: i64,
) -> Result<Vec<AuditEntry>, StoreError> {
    let rows = sqlx::query(&format!(
        "SELECT {AUDIT_COLUMNS} FROM processing_audit \
         WHERE url = $1 ORDER BY created_at DESC LIMIT $2"
    ))
    .bind(url)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.iter().map(audit_from_row).collect::<Result<_, _>>().map_err(Into::into)
}

/// Recent attempts for a publisher, newest first.
pub async fn for_publisher(
    pool: &PgPool,
    publisher_id: Uuid,
    limit: i64,
) -> Result<Vec<AuditEntry>, StoreError> {
    let rows = sqlx::query(&format!(
        "SELECT {AUDIT_COLUMNS} FROM processing_audit \
         WHERE publisher_id = $1 ORDER BY created_at DESC LIMIT $2"
    ))
    .bind(publisher_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.iter().map(audit_from_row).collect::<Result<_, _>>().map_err(Into::into)
}

/// Recent attempts with a given terminal status, newest first.
pub async fn by_status(
    pool: &PgPool,
    status: AuditStatus,
    limit: i64,
) -> Result<Vec<AuditEntry>, StoreError> {
    let rows = sqlx::query(&format!(
        "SELECT {AUDIT_COLUMNS} FROM processing_audit \
         WHERE status = $1 ORDER BY created_at DESC LIMIT $2"
    ))
    .bind(status.as_str())
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.iter().map(audit_from_row).collect::<Result<_, _>>().map_err(Into::into)
}

/// All attempts recorded under one job id, oldest first.
pub async fn by_job_id(pool: &PgPool, job_id: Uuid) -> Result<Vec<AuditEntry>, StoreError> {
    let rows = sqlx::query(&format!(
        "SELECT {AUDIT_COLUMNS} FROM processing_audit \
         WHERE job_id = $1 ORDER BY created_at"
    ))
    .bind(job_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(audit_from_row).collect::<Result<_, _>>().map_err(Into::into)
}

/// Most recent attempts across all URLs.
pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<AuditEntry>, StoreError> {
    let rows = sqlx::query(&format!(
        "SELECT {AUDIT_COLUMNS} FROM processing_audit ORDER BY created_at DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.iter().map(audit_from_row).collect::<Result<_, _>>().map_err(Into::into)
}
