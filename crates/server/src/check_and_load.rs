//! The check-and-load service behind the widget endpoint.
//!
//! Exactly one of (fast-path return) or (queue creation/transition) is
//! observable per call: the fast path returns before any queue write, and
//! every queue write below is a single atomic store operation.

use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use blogqa_store::{content, metadata, queue, Publisher, Question, QueueEntry, QueueStatus, TransitionUpdate};

use crate::auth::SlotReservation;
use crate::response::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QuestionView {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BlogInfo {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub author: String,
    pub published_date: String,
    pub question_count: usize,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CheckAndLoadResult {
    /// `ready`, `queued`, `processing`, `retry`, or `failed`.
    pub processing_status: String,
    pub blog_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<QuestionView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blog_info: Option<BlogInfo>,
    #[schema(value_type = Option<String>)]
    pub job_id: Option<Uuid>,
    pub message: String,
}

fn status_result(entry: &QueueEntry, message: &str) -> CheckAndLoadResult {
    CheckAndLoadResult {
        processing_status: entry.status.as_str().to_string(),
        blog_url: entry.url.clone(),
        questions: None,
        blog_info: None,
        job_id: entry.current_job_id,
        message: message.to_string(),
    }
}

/// Build the `ready` response: shuffled questions plus blog info.
async fn ready_result(
    state: &AppState,
    normalized_url: &str,
    mut questions: Vec<Question>,
) -> ApiResult<CheckAndLoadResult> {
    questions.shuffle(&mut rand::thread_rng());

    let blog = content::get_blog(&state.pool, normalized_url).await?;
    let question_count = questions.len();

    let views: Vec<QuestionView> = questions
        .into_iter()
        .map(|q| QuestionView {
            id: q.id,
            question: q.question,
            answer: q.answer,
        })
        .collect();

    let blog_info = blog.map(|b| BlogInfo {
        id: b.id,
        title: b.title,
        url: normalized_url.to_string(),
        author: b.author.unwrap_or_default(),
        published_date: b.published_date.unwrap_or_default(),
        question_count,
    });

    Ok(CheckAndLoadResult {
        processing_status: "ready".to_string(),
        blog_url: normalized_url.to_string(),
        questions: Some(views),
        blog_info,
        job_id: None,
        message: "Questions ready - loaded from cache".to_string(),
    })
}

/// Run the check-and-load algorithm for an authenticated, domain-checked,
/// whitelisted publisher request.
pub async fn check_and_load(
    state: &AppState,
    publisher: &Publisher,
    normalized_url: &str,
) -> ApiResult<CheckAndLoadResult> {
    let pool = &state.pool;

    // Fast path: questions exist, read-only return.
    let questions = content::get_questions(pool, normalized_url, None).await?;
    if !questions.is_empty() {
        info!("Fast path: {} questions for {}", questions.len(), normalized_url);
        return ready_result(state, normalized_url, questions).await;
    }

    // State probe + branch.
    let existing = queue::get_by_url(pool, normalized_url).await?;

    match existing {
        None => {
            let (entry, created) = queue::get_or_create(pool, normalized_url, publisher.id).await?;
            if !created {
                // Lost the creation race; report the winner's state.
                return Ok(status_result(&entry, "Blog is already tracked"));
            }
            admit_new_entry(state, publisher, normalized_url, entry).await
        }
        Some(entry) => match entry.status {
            QueueStatus::Queued if entry.current_job_id.is_none() => {
                // Still gated below the threshold; this request counts too.
                admit_gated_entry(state, publisher, normalized_url, entry).await
            }
            QueueStatus::Queued => Ok(status_result(&entry, "Blog processing is queued")),
            QueueStatus::Processing => {
                Ok(status_result(&entry, "Blog is currently being processed"))
            }
            QueueStatus::Retry => Ok(status_result(&entry, "Blog processing will be retried")),
            QueueStatus::Failed => requeue_and_admit(state, publisher, normalized_url, false).await,
            QueueStatus::Completed => {
                // Completed but the fast path found nothing: heal the
                // inconsistency by treating the entry as failed and requeueing.
                info!("Healing completed-but-empty entry for {}", normalized_url);
                queue::transition(
                    pool,
                    normalized_url,
                    Some(QueueStatus::Completed),
                    QueueStatus::Failed,
                    TransitionUpdate {
                        was_previously_completed: Some(true),
                        ..TransitionUpdate::failure(
                            "completed entry has no stored questions",
                            "CONTENT_MISSING",
                        )
                    },
                )
                .await?;
                requeue_and_admit(state, publisher, normalized_url, true).await
            }
        },
    }
}

/// New entry: count the request, apply the threshold gate, then reserve.
async fn admit_new_entry(
    state: &AppState,
    publisher: &Publisher,
    normalized_url: &str,
    entry: QueueEntry,
) -> ApiResult<CheckAndLoadResult> {
    let pool = &state.pool;
    let count = metadata::increment_and_get_count(pool, normalized_url, publisher.id).await?;

    if count < publisher.config.processing_threshold as i64 {
        info!(
            "Threshold gate: {} has {}/{} requests",
            normalized_url, count, publisher.config.processing_threshold,
        );
        return Ok(status_result(
            &entry,
            "Blog queued; waiting for more reader demand",
        ));
    }

    let reservation = match SlotReservation::take(pool, publisher.id).await {
        Ok(r) => r,
        Err(e) => {
            // Fresh entry, nothing leased it yet: roll the creation back.
            queue::delete_if_queued(pool, normalized_url).await?;
            return Err(e);
        }
    };

    match queue::assign_job_id(pool, normalized_url).await {
        Ok(Some(admitted)) => {
            reservation.keep();
            Ok(status_result(
                &admitted,
                "Processing started - check back in 30-60 seconds",
            ))
        }
        Ok(None) => {
            // The entry moved under us (leased or deleted); report its state.
            reservation.rollback(pool).await;
            match queue::get_by_url(pool, normalized_url).await? {
                Some(entry) => Ok(status_result(&entry, "Blog is already tracked")),
                None => Err(ApiError::internal(format!(
                    "queue entry for {normalized_url} vanished during admission"
                ))),
            }
        }
        Err(e) => {
            reservation.rollback(pool).await;
            Err(e.into())
        }
    }
}

/// Pre-existing gated entry: keep counting requests until the threshold.
async fn admit_gated_entry(
    state: &AppState,
    publisher: &Publisher,
    normalized_url: &str,
    entry: QueueEntry,
) -> ApiResult<CheckAndLoadResult> {
    let pool = &state.pool;
    let count = metadata::increment_and_get_count(pool, normalized_url, publisher.id).await?;

    if count < publisher.config.processing_threshold as i64 {
        return Ok(status_result(
            &entry,
            "Blog queued; waiting for more reader demand",
        ));
    }

    let reservation = SlotReservation::take(pool, publisher.id).await?;
    match queue::assign_job_id(pool, normalized_url).await {
        Ok(Some(admitted)) => {
            reservation.keep();
            Ok(status_result(
                &admitted,
                "Processing started - check back in 30-60 seconds",
            ))
        }
        Ok(None) => {
            // Another caller admitted it first.
            reservation.rollback(pool).await;
            match queue::get_by_url(pool, normalized_url).await? {
                Some(entry) => Ok(status_result(&entry, "Blog processing is queued")),
                None => Err(ApiError::internal(format!(
                    "queue entry for {normalized_url} vanished during admission"
                ))),
            }
        }
        Err(e) => {
            reservation.rollback(pool).await;
            Err(e.into())
        }
    }
}

/// Failed (or just-healed) entry: requeue as a fresh admission.
async fn requeue_and_admit(
    state: &AppState,
    publisher: &Publisher,
    normalized_url: &str,
    healed: bool,
) -> ApiResult<CheckAndLoadResult> {
    let pool = &state.pool;

    let requeued = match queue::requeue_failed(pool, normalized_url, true, healed).await? {
        Some(entry) => entry,
        None => {
            // Someone else already requeued or leased it; report current state.
            return match queue::get_by_url(pool, normalized_url).await? {
                Some(entry) => Ok(status_result(&entry, "Blog is already tracked")),
                None => Err(ApiError::not_found(format!(
                    "queue entry for {normalized_url}"
                ))),
            };
        }
    };

    match SlotReservation::take(pool, publisher.id).await {
        Ok(reservation) => {
            reservation.keep();
            Ok(status_result(
                &requeued,
                "Blog requeued for processing - check back in 30-60 seconds",
            ))
        }
        Err(e) => {
            // Reservation failed after the requeue: put the entry back.
            queue::transition(
                pool,
                normalized_url,
                Some(QueueStatus::Queued),
                QueueStatus::Failed,
                TransitionUpdate::failure(
                    "requeue rolled back: slot reservation failed",
                    "RESERVATION_FAILED",
                ),
            )
            .await?;
            Err(e)
        }
    }
}
