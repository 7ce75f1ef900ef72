use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Publisher ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Publisher {
    pub id: Uuid,
    pub name: String,
    pub domain: String,
    pub api_key: String,
    pub status: PublisherStatus,
    pub config: PublisherConfig,
    pub usage: PublisherUsage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Publisher {
    pub fn is_active(&self) -> bool {
        matches!(self.status, PublisherStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublisherStatus {
    Active,
    Inactive,
}

impl PublisherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub daily_blog_limit: i32,
    pub whitelisted_url_patterns: Vec<String>,
    pub llm_model: String,
    pub embedding_model: String,
    pub questions_per_blog: i32,
    /// Request count a cold URL must reach before it is admitted.
    pub processing_threshold: i32,
    pub custom_summary_prompt: Option<String>,
    pub custom_question_prompt: Option<String>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            daily_blog_limit: 100,
            whitelisted_url_patterns: Vec::new(),
            llm_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            questions_per_blog: 5,
            processing_threshold: 1,
            custom_summary_prompt: None,
            custom_question_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublisherUsage {
    pub blogs_processed_total: i64,
    pub blogs_processed_today: i32,
    pub current_day_bucket: NaiveDate,
    pub in_flight_reservations: i32,
}

/// Input for publisher creation (admin API).
#[derive(Debug, Clone, Deserialize)]
pub struct NewPublisher {
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub config: Option<PublisherConfig>,
}

/// Partial update for a publisher (admin API). `None` leaves a field as is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublisherUpdate {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub status: Option<PublisherStatus>,
    pub config: Option<PublisherConfig>,
}

// ── Processing queue ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Queued,
    Processing,
    Retry,
    Completed,
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Retry => "retry",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "retry" => Some(Self::Retry),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub url: String,
    pub publisher_id: Uuid,
    pub status: QueueStatus,
    pub attempt_count: i32,
    pub current_job_id: Option<Uuid>,
    pub worker_id: Option<String>,
    pub last_error: Option<String>,
    pub error_type: Option<String>,
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub heartbeat_interval_seconds: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub healed: bool,
    pub reprocessed_count: i32,
    pub last_reprocessed_at: Option<DateTime<Utc>>,
    pub was_previously_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub queued: i64,
    pub processing: i64,
    pub retry: i64,
    pub completed: i64,
    pub failed: i64,
    pub total: i64,
}

// ── Audit ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Completed,
    Failed,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub url: String,
    pub publisher_id: Uuid,
    pub job_id: Option<Uuid>,
    pub worker_id: String,
    pub status: AuditStatus,
    pub attempt_number: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub processing_time_seconds: f64,
    pub question_count: Option<i32>,
    pub summary_length: Option<i32>,
    pub embedding_count: Option<i32>,
    pub error_message: Option<String>,
    pub error_type: Option<String>,
    pub error_stack_trace: Option<String>,
    pub blog_title: Option<String>,
    pub content_length: Option<i32>,
    pub llm_model: Option<String>,
    pub embedding_model: Option<String>,
    pub publisher_config: Option<serde_json::Value>,
    pub is_reprocess: bool,
    pub reprocess_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for one audit append. Optional snapshot fields default to none.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub url: String,
    pub publisher_id: Uuid,
    pub job_id: Option<Uuid>,
    pub worker_id: String,
    pub status: AuditStatus,
    pub attempt_number: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub question_count: Option<i32>,
    pub summary_length: Option<i32>,
    pub embedding_count: Option<i32>,
    pub error_message: Option<String>,
    pub error_type: Option<String>,
    pub error_stack_trace: Option<String>,
    pub blog_title: Option<String>,
    pub content_length: Option<i32>,
    pub llm_model: Option<String>,
    pub embedding_model: Option<String>,
    pub publisher_config: Option<serde_json::Value>,
    pub is_reprocess: bool,
    pub reprocess_reason: Option<String>,
}

// ── URL metadata ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct UrlMetadata {
    pub url: String,
    pub publisher_id: Uuid,
    pub request_count: i64,
    pub first_requested_at: DateTime<Utc>,
    pub last_requested_at: DateTime<Utc>,
}

// ── Content ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Blog {
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub published_date: Option<String>,
    pub content: String,
    pub language: Option<String>,
    pub word_count: i32,
    pub crawled_at: DateTime<Utc>,
}

/// Input for persisting a crawled blog.
#[derive(Debug, Clone)]
pub struct NewBlog {
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub published_date: Option<String>,
    pub content: String,
    pub language: Option<String>,
    pub word_count: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub blog_url: String,
    pub summary_text: String,
    pub key_points: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub blog_url: String,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_status_round_trip() {
        for status in [
            QueueStatus::Queued,
            QueueStatus::Processing,
            QueueStatus::Retry,
            QueueStatus::Completed,
            QueueStatus::Failed,
        ] {
            assert_eq!(QueueStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(QueueStatus::parse("bogus"), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(QueueStatus::Completed.is_terminal());
        assert!(QueueStatus::Failed.is_terminal());
        assert!(!QueueStatus::Queued.is_terminal());
        assert!(!QueueStatus::Processing.is_terminal());
        assert!(!QueueStatus::Retry.is_terminal());
    }

    #[test]
    fn publisher_config_defaults() {
        let config = PublisherConfig::default();
        assert_eq!(config.daily_blog_limit, 100);
        assert_eq!(config.questions_per_blog, 5);
        assert_eq!(config.processing_threshold, 1);
        assert!(config.whitelisted_url_patterns.is_empty());
        assert!(config.custom_summary_prompt.is_none());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&QueueStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert_eq!(
            serde_json::to_string(&AuditStatus::Failed).unwrap(),
            "\"failed\""
        );
    }
}
