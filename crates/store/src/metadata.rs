//! Per-URL request counting for the threshold gate.

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::UrlMetadata;

/// Atomically bump the request count for a URL and return the new value.
///
/// Upsert + increment in one round trip: the first request creates the row
/// with count 1, later requests only touch the counter and timestamps.
pub async fn increment_and_get_count(
    pool: &PgPool,
    url: &str,
    publisher_id: Uuid,
) -> Result<i64, StoreError> {
    let row = sqlx::query(
        "INSERT INTO url_metadata (url, publisher_id, request_count) \
         VALUES ($1, $2, 1) \
         ON CONFLICT (url) DO UPDATE SET \
         request_count = url_metadata.request_count + 1, \
         last_requested_at = now(), \
         updated_at = now() \
         RETURNING request_count",
    )
    .bind(url)
    .bind(publisher_id)
    .fetch_one(pool)
    .await?;
    Ok(row.get("request_count"))
}

/// Current request count for a URL (0 when never requested). Diagnostics only.
pub async fn get_count(pool: &PgPool, url: &str) -> Result<i64, StoreError> {
    let count: Option<i64> =
        sqlx::query_scalar("SELECT request_count FROM url_metadata WHERE url = $1")
            .bind(url)
            .fetch_optional(pool)
            .await?;
    Ok(count.unwrap_or(0))
}

/// Full metadata row for a URL. Diagnostics only.
pub async fn get(pool: &PgPool, url: &str) -> Result<Option<UrlMetadata>, StoreError> {
    let row = sqlx::query(
        "SELECT url, publisher_id, request_count, first_requested_at, last_requested_at \
         FROM url_metadata WHERE url = $1",
    )
    .bind(url)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| UrlMetadata {
        url: r.get("url"),
        publisher_id: r.get("publisher_id"),
        request_count: r.get("request_count"),
        first_requested_at: r.get("first_requested_at"),
        last_requested_at: r.get("last_requested_at"),
    }))
}
