//! Publisher records: identity, configuration, whitelist, and quota counters.
//!
//! Quota counters are only ever touched by [`reserve_blog_slot`] and
//! [`release_blog_slot`]; both fold their read-modify-write into a single
//! conditional UPDATE so the day-bucket rollover can never race a
//! reservation.

use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    NewPublisher, Publisher, PublisherConfig, PublisherStatus, PublisherUpdate, PublisherUsage,
};

const PUBLISHER_COLUMNS: &str = "id, name, domain, api_key, status, daily_blog_limit, \
     whitelisted_url_patterns, llm_model, embedding_model, questions_per_blog, \
     processing_threshold, custom_summary_prompt, custom_question_prompt, \
     blogs_processed_total, blogs_processed_today, current_day_bucket, \
     in_flight_reservations, created_at, updated_at";

fn publisher_from_row(row: &PgRow) -> Result<Publisher, sqlx::Error> {
    let status_raw: String = row.get("status");
    let status = PublisherStatus::parse(&status_raw).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "status".into(),
        source: format!("unknown publisher status '{status_raw}'").into(),
    })?;

    Ok(Publisher {
        id: row.get("id"),
        name: row.get("name"),
        domain: row.get("domain"),
        api_key: row.get("api_key"),
        status,
        config: PublisherConfig {
            daily_blog_limit: row.get("daily_blog_limit"),
            whitelisted_url_patterns: row.get("whitelisted_url_patterns"),
            llm_model: row.get("llm_model"),
            embedding_model: row.get("embedding_model"),
            questions_per_blog: row.get("questions_per_blog"),
            processing_threshold: row.get("processing_threshold"),
            custom_summary_prompt: row.get("custom_summary_prompt"),
            custom_question_prompt: row.get("custom_question_prompt"),
        },
        usage: PublisherUsage {
            blogs_processed_total: row.get("blogs_processed_total"),
            blogs_processed_today: row.get("blogs_processed_today"),
            current_day_bucket: row.get("current_day_bucket"),
            in_flight_reservations: row.get("in_flight_reservations"),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Generate an opaque publisher API key (`pub_` + 32 hex chars).
pub fn generate_api_key() -> String {
    format!("pub_{}", Uuid::new_v4().simple())
}

// ── CRUD ──────────────────────────────────────────────────────

pub async fn create(pool: &PgPool, input: &NewPublisher) -> Result<Publisher, StoreError> {
    let id = Uuid::new_v4();
    let api_key = generate_api_key();
    let config = input.config.clone().unwrap_or_default();

    let row = sqlx::query(&format!(
        "INSERT INTO publishers (id, name, domain, api_key, status, daily_blog_limit, \
         whitelisted_url_patterns, llm_model, embedding_model, questions_per_blog, \
         processing_threshold, custom_summary_prompt, custom_question_prompt) \
         VALUES ($1, $2, $3, $4, 'active', $5, $6, $7, $8, $9, $10, $11, $12) \
         RETURNING {PUBLISHER_COLUMNS}"
    ))
    .bind(id)
    .bind(&input.name)
    .bind(input.domain.to_lowercase())
    .bind(&api_key)
    .bind(config.daily_blog_limit)
    .bind(&config.whitelisted_url_patterns)
    .bind(&config.llm_model)
    .bind(&config.embedding_model)
    .bind(config.questions_per_blog)
    .bind(config.processing_threshold)
    .bind(&config.custom_summary_prompt)
    .bind(&config.custom_question_prompt)
    .fetch_one(pool)
    .await?;

    info!("Created publisher '{}' ({})", input.name, id);
    Ok(publisher_from_row(&row)?)
}

pub async fn get_by_api_key(pool: &PgPool, api_key: &str) -> Result<Option<Publisher>, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {PUBLISHER_COLUMNS} FROM publishers WHERE api_key = $1"
    ))
    .bind(api_key)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(publisher_from_row).transpose().map_err(Into::into)
}

pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Publisher>, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {PUBLISHER_COLUMNS} FROM publishers WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(publisher_from_row).transpose().map_err(Into::into)
}

pub async fn list(pool: &PgPool) -> Result<Vec<Publisher>, StoreError> {
    let rows = sqlx::query(&format!(
        "SELECT {PUBLISHER_COLUMNS} FROM publishers ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await?;
    rows.iter()
        .map(publisher_from_row)
        .collect::<Result<Vec<_>, _>>()
        .map_err(Into::into)
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    update: &PublisherUpdate,
) -> Result<Option<Publisher>, StoreError> {
    let config = update.config.clone();
    let row = sqlx::query(&format!(
        "UPDATE publishers SET \
         name = COALESCE($2, name), \
         domain = COALESCE($3, domain), \
         status = COALESCE($4, status), \
         daily_blog_limit = COALESCE($5, daily_blog_limit), \
         whitelisted_url_patterns = COALESCE($6, whitelisted_url_patterns), \
         llm_model = COALESCE($7, llm_model), \
         embedding_model = COALESCE($8, embedding_model), \
         questions_per_blog = COALESCE($9, questions_per_blog), \
         processing_threshold = COALESCE($10, processing_threshold), \
         custom_summary_prompt = CASE WHEN $11 THEN $12 ELSE custom_summary_prompt END, \
         custom_question_prompt = CASE WHEN $11 THEN $13 ELSE custom_question_prompt END, \
         updated_at = now() \
         WHERE id = $1 \
         RETURNING {PUBLISHER_COLUMNS}"
    ))
    .bind(id)
    .bind(&update.name)
    .bind(update.domain.as_ref().map(|d| d.to_lowercase()))
    .bind(update.status.map(|s| s.as_str()))
    .bind(config.as_ref().map(|c| c.daily_blog_limit))
    .bind(config.as_ref().map(|c| c.whitelisted_url_patterns.clone()))
    .bind(config.as_ref().map(|c| c.llm_model.clone()))
    .bind(config.as_ref().map(|c| c.embedding_model.clone()))
    .bind(config.as_ref().map(|c| c.questions_per_blog))
    .bind(config.as_ref().map(|c| c.processing_threshold))
    .bind(config.is_some())
    .bind(config.as_ref().and_then(|c| c.custom_summary_prompt.clone()))
    .bind(config.as_ref().and_then(|c| c.custom_question_prompt.clone()))
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(publisher_from_row).transpose().map_err(Into::into)
}

pub async fn regenerate_api_key(pool: &PgPool, id: Uuid) -> Result<Option<Publisher>, StoreError> {
    let api_key = generate_api_key();
    let row = sqlx::query(&format!(
        "UPDATE publishers SET api_key = $2, updated_at = now() WHERE id = $1 \
         RETURNING {PUBLISHER_COLUMNS}"
    ))
    .bind(id)
    .bind(&api_key)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(publisher_from_row).transpose().map_err(Into::into)
}

/// Delete a publisher. Refused while any queue entry still references it.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, StoreError> {
    let referenced: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM processing_queue WHERE publisher_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
    if referenced > 0 {
        return Err(StoreError::Conflict(format!(
            "publisher has {referenced} queue entries; delete those first"
        )));
    }

    let result = sqlx::query("DELETE FROM publishers WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ── Quota: slot reservation ───────────────────────────────────

/// Reserve one processing slot against the publisher's daily limit.
///
/// The day-bucket reset and the admission check run in the same statement:
/// when `current_day_bucket` is stale, today's count is treated as zero for
/// both the comparison and the write.
pub async fn reserve_blog_slot(pool: &PgPool, id: Uuid) -> Result<Publisher, StoreError> {
    let today = Utc::now().date_naive();

    let row = sqlx::query(&format!(
        "UPDATE publishers SET \
         blogs_processed_today = CASE WHEN current_day_bucket = $2 THEN blogs_processed_today ELSE 0 END, \
         current_day_bucket = $2, \
         in_flight_reservations = in_flight_reservations + 1, \
         updated_at = now() \
         WHERE id = $1 \
         AND (CASE WHEN current_day_bucket = $2 THEN blogs_processed_today ELSE 0 END) \
             + in_flight_reservations < daily_blog_limit \
         RETURNING {PUBLISHER_COLUMNS}"
    ))
    .bind(id)
    .bind(today)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(publisher_from_row(&row)?),
        None => {
            // No row updated: either the publisher is gone or the limit hit.
            let publisher = get_by_id(pool, id).await?.ok_or(StoreError::NotFound("publisher"))?;
            warn!(
                "Daily limit reached for publisher {} ({}/{})",
                id, publisher.usage.blogs_processed_today, publisher.config.daily_blog_limit,
            );
            Err(StoreError::UsageLimitExceeded {
                limit: publisher.config.daily_blog_limit,
            })
        }
    }
}

/// Release a previously reserved slot.
///
/// `processed = true` also counts the blog against today's and the lifetime
/// totals. The decrement clamps at zero so a release for a threshold-gated
/// entry that was never reserved cannot drive the counter negative.
pub async fn release_blog_slot(
    pool: &PgPool,
    id: Uuid,
    processed: bool,
) -> Result<Option<Publisher>, StoreError> {
    let row = sqlx::query(&format!(
        "UPDATE publishers SET \
         in_flight_reservations = GREATEST(in_flight_reservations - 1, 0), \
         blogs_processed_today = blogs_processed_today + CASE WHEN $2 THEN 1 ELSE 0 END, \
         blogs_processed_total = blogs_processed_total + CASE WHEN $2 THEN 1 ELSE 0 END, \
         updated_at = now() \
         WHERE id = $1 \
         RETURNING {PUBLISHER_COLUMNS}"
    ))
    .bind(id)
    .bind(processed)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(publisher_from_row).transpose().map_err(Into::into)
}

// ── Whitelist ─────────────────────────────────────────────────

/// Check a normalized URL against the publisher's whitelist patterns.
///
/// An entry is a full-URL prefix (normalized), a leading-`/` path prefix, or
/// a bare host/path treated as a prefix. `*` matches everything. An empty
/// list allows everything.
pub fn is_url_whitelisted(normalized_url: &str, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return true;
    }

    let path = url::Url::parse(normalized_url)
        .map(|u| u.path().to_string())
        .unwrap_or_default();

    for raw in patterns {
        let entry = raw.trim();
        if entry.is_empty() {
            continue;
        }
        if entry == "*" {
            return true;
        }

        if entry.contains("://") {
            if let Ok(allowed) = blogqa_core::url::normalize(entry) {
                if normalized_url.starts_with(&allowed) {
                    return true;
                }
            }
            continue;
        }

        if let Some(prefix) = entry.strip_prefix('/') {
            if path.strip_prefix('/').is_some_and(|p| p.starts_with(prefix)) {
                return true;
            }
            continue;
        }

        // Bare host or host/path fragment. A host-only entry normalizes to
        // "https://host/", so it cannot prefix-match a longer hostname.
        if let Ok(candidate) = blogqa_core::url::normalize(&format!("https://{entry}")) {
            if normalized_url.starts_with(&candidate) {
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_whitelist_allows_all() {
        assert!(is_url_whitelisted("https://example.com/any", &[]));
    }

    #[test]
    fn wildcard_allows_all() {
        assert!(is_url_whitelisted(
            "https://example.com/any",
            &patterns(&["*"])
        ));
    }

    #[test]
    fn full_url_prefix_match() {
        let wl = patterns(&["https://www.example.com/news/"]);
        assert!(is_url_whitelisted("https://example.com/news/today", &wl));
        assert!(!is_url_whitelisted("https://example.com/sports/today", &wl));
    }

    #[test]
    fn path_prefix_match() {
        let wl = patterns(&["/news"]);
        assert!(is_url_whitelisted("https://example.com/news/today", &wl));
        assert!(is_url_whitelisted("https://other.com/newsletter", &wl));
        assert!(!is_url_whitelisted("https://example.com/blog/post", &wl));
    }

    #[test]
    fn bare_host_prefix_match() {
        let wl = patterns(&["example.com/blog"]);
        assert!(is_url_whitelisted("https://example.com/blog/post-1", &wl));
        assert!(!is_url_whitelisted("https://example.com/shop", &wl));
    }

    #[test]
    fn blank_entries_are_skipped() {
        let wl = patterns(&["", "  ", "/news"]);
        assert!(is_url_whitelisted("https://example.com/news/x", &wl));
        assert!(!is_url_whitelisted("https://example.com/other", &wl));
    }

    #[test]
    fn non_matching_list_denies() {
        let wl = patterns(&["https://example.com/a", "/b"]);
        assert!(!is_url_whitelisted("https://example.com/c", &wl));
    }

    #[test]
    fn generated_keys_have_prefix_and_length() {
        let key = generate_api_key();
        assert!(key.starts_with("pub_"));
        assert_eq!(key.len(), 4 + 32);
        assert_ne!(generate_api_key(), generate_api_key());
    }
}
