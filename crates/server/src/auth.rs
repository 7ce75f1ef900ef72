//! API-key resolution and the admission chain for the ingest path.
//!
//! Admission order is fixed: key → active → domain → whitelist → slot
//! reservation. Anything that fails after a successful reservation must
//! roll it back with `processed = false` before surfacing the error.

use axum::http::HeaderMap;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use blogqa_store::{publisher, Publisher};

use crate::response::ApiError;
use crate::state::AppState;

pub const PUBLISHER_KEY_HEADER: &str = "x-api-key";
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).filter(|v| !v.is_empty())
}

/// Resolve the publisher from `X-API-Key`. 401 when missing or unknown.
pub async fn require_publisher(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Publisher, ApiError> {
    let api_key = header_value(headers, PUBLISHER_KEY_HEADER)
        .ok_or_else(|| ApiError::unauthorized("missing X-API-Key header"))?;

    publisher::get_by_api_key(&state.pool, api_key)
        .await?
        .ok_or_else(|| ApiError::unauthorized("invalid API key"))
}

/// Check `X-Admin-Key` against the process-wide shared secret.
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let key = header_value(headers, ADMIN_KEY_HEADER)
        .ok_or_else(|| ApiError::unauthorized("missing X-Admin-Key header"))?;
    if key != state.config.auth.admin_api_key {
        return Err(ApiError::unauthorized("invalid admin key"));
    }
    Ok(())
}

/// Publisher must be active to ingest.
pub fn check_active(publisher: &Publisher) -> Result<(), ApiError> {
    if !publisher.is_active() {
        return Err(ApiError::forbidden(
            "PUBLISHER_INACTIVE",
            "Publisher account not active",
            format!("publisher '{}' is inactive", publisher.name),
        ));
    }
    Ok(())
}

/// The blog host must equal the publisher's primary domain or be one of its
/// subdomains.
pub fn check_domain(publisher: &Publisher, normalized_url: &str) -> Result<(), ApiError> {
    let host = blogqa_core::url::domain(normalized_url)
        .map_err(|e| ApiError::validation(e.to_string(), "blog_url"))?;
    if !blogqa_core::url::is_same_or_subdomain(&host, &publisher.domain) {
        warn!(
            "Domain mismatch: '{}' does not match publisher domain '{}'",
            host, publisher.domain,
        );
        return Err(ApiError::forbidden(
            "DOMAIN_MISMATCH",
            "Blog URL domain mismatch",
            format!(
                "blog URL domain '{}' does not match your publisher domain '{}'",
                host, publisher.domain,
            ),
        ));
    }
    Ok(())
}

/// The URL must be allowed by the publisher's whitelist (empty = allow-all).
pub fn check_whitelist(publisher: &Publisher, normalized_url: &str) -> Result<(), ApiError> {
    if !publisher::is_url_whitelisted(normalized_url, &publisher.config.whitelisted_url_patterns) {
        return Err(ApiError::forbidden(
            "NOT_WHITELISTED",
            "Blog URL not whitelisted",
            format!("'{normalized_url}' is not allowed by this publisher's whitelist"),
        ));
    }
    Ok(())
}

/// Run the pre-reservation admission checks (active → domain → whitelist).
pub fn check_admission(publisher: &Publisher, normalized_url: &str) -> Result<(), ApiError> {
    check_active(publisher)?;
    check_domain(publisher, normalized_url)?;
    check_whitelist(publisher, normalized_url)
}

/// A reserved quota slot that must be explicitly kept or rolled back.
///
/// Ownership of the reservation passes to the worker on the happy path
/// (`keep`). Error paths call `rollback`, which releases the slot with
/// `processed = false`. Dropping without either logs loudly; it means a
/// code path leaked quota.
#[must_use = "a reservation must be kept or rolled back"]
pub struct SlotReservation {
    publisher_id: Uuid,
    disposed: bool,
}

impl SlotReservation {
    /// Reserve a slot. Translates a hit quota into `DAILY_LIMIT_REACHED`.
    pub async fn take(pool: &PgPool, publisher_id: Uuid) -> Result<Self, ApiError> {
        publisher::reserve_blog_slot(pool, publisher_id).await?;
        Ok(Self {
            publisher_id,
            disposed: false,
        })
    }

    /// The reservation stays; the worker releases it on terminal transition.
    pub fn keep(mut self) {
        self.disposed = true;
    }

    /// Release the slot unprocessed.
    pub async fn rollback(mut self, pool: &PgPool) {
        self.disposed = true;
        if let Err(e) = publisher::release_blog_slot(pool, self.publisher_id, false).await {
            warn!(
                "Failed to release reserved slot for publisher {}: {}",
                self.publisher_id, e,
            );
        }
    }
}

impl Drop for SlotReservation {
    fn drop(&mut self) {
        if !self.disposed {
            warn!(
                "Slot reservation for publisher {} dropped without keep/rollback",
                self.publisher_id,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogqa_store::{PublisherConfig, PublisherStatus, PublisherUsage};
    use chrono::Utc;

    fn test_publisher(status: PublisherStatus, patterns: &[&str]) -> Publisher {
        Publisher {
            id: Uuid::new_v4(),
            name: "Test Pub".into(),
            domain: "example.com".into(),
            api_key: "pub_test".into(),
            status,
            config: PublisherConfig {
                whitelisted_url_patterns: patterns.iter().map(|s| s.to_string()).collect(),
                ..PublisherConfig::default()
            },
            usage: PublisherUsage {
                blogs_processed_total: 0,
                blogs_processed_today: 0,
                current_day_bucket: Utc::now().date_naive(),
                in_flight_reservations: 0,
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn inactive_publisher_is_rejected() {
        let publisher = test_publisher(PublisherStatus::Inactive, &[]);
        let err = check_active(&publisher).unwrap_err();
        assert_eq!(err.code, "PUBLISHER_INACTIVE");
    }

    #[test]
    fn domain_match_allows_subdomains() {
        let publisher = test_publisher(PublisherStatus::Active, &[]);
        assert!(check_domain(&publisher, "https://example.com/post").is_ok());
        assert!(check_domain(&publisher, "https://blog.example.com/post").is_ok());

        let err = check_domain(&publisher, "https://evil.com/post").unwrap_err();
        assert_eq!(err.code, "DOMAIN_MISMATCH");
        assert_eq!(err.status, axum::http::StatusCode::FORBIDDEN);
    }

    #[test]
    fn whitelist_denial_has_code() {
        let publisher = test_publisher(PublisherStatus::Active, &["/news"]);
        assert!(check_whitelist(&publisher, "https://example.com/news/today").is_ok());
        let err = check_whitelist(&publisher, "https://example.com/blog/post").unwrap_err();
        assert_eq!(err.code, "NOT_WHITELISTED");
    }

    #[test]
    fn admission_chain_order() {
        // Inactive trumps domain mismatch: the chain checks status first.
        let publisher = test_publisher(PublisherStatus::Inactive, &[]);
        let err = check_admission(&publisher, "https://evil.com/post").unwrap_err();
        assert_eq!(err.code, "PUBLISHER_INACTIVE");
    }
}
