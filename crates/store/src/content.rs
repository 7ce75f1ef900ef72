//! Crawled blogs, generated summaries, and question/answer pairs.
//!
//! Embeddings are stored as pgvector columns next to the text they embed.
//! Vector search is deliberately absent; the widget only ever reads by URL.

use pgvector::Vector;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Blog, NewBlog, Question, Summary};

fn blog_from_row(row: &PgRow) -> Blog {
    Blog {
        id: row.get("id"),
        url: row.get("url"),
        title: row.get("title"),
        author: row.get("author"),
        published_date: row.get("published_date"),
        content: row.get("content"),
        language: row.get("language"),
        word_count: row.get("word_count"),
        crawled_at: row.get("crawled_at"),
    }
}

fn question_from_row(row: &PgRow) -> Question {
    Question {
        id: row.get("id"),
        blog_id: row.get("blog_id"),
        blog_url: row.get("blog_url"),
        question: row.get("question"),
        answer: row.get("answer"),
        created_at: row.get("created_at"),
    }
}

/// Persist a crawled blog, returning its id.
///
/// Idempotent on the normalized URL: a second save refreshes the crawl
/// fields and hands back the original id, so a worker retry or a crashed
/// run can never produce duplicate blog rows.
pub async fn save_blog(pool: &PgPool, blog: &NewBlog) -> Result<Uuid, StoreError> {
    let id = Uuid::new_v4();
    let row = sqlx::query(
        "INSERT INTO blogs (id, url, title, author, published_date, content, language, word_count) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (url) DO UPDATE SET \
         title = EXCLUDED.title, \
         author = EXCLUDED.author, \
         published_date = EXCLUDED.published_date, \
         content = EXCLUDED.content, \
         language = EXCLUDED.language, \
         word_count = EXCLUDED.word_count, \
         crawled_at = now() \
         RETURNING id",
    )
    .bind(id)
    .bind(&blog.url)
    .bind(&blog.title)
    .bind(&blog.author)
    .bind(&blog.published_date)
    .bind(&blog.content)
    .bind(&blog.language)
    .bind(blog.word_count)
    .fetch_one(pool)
    .await?;

    let blog_id: Uuid = row.get("id");
    debug!("Saved blog {} as {}", blog.url, blog_id);
    Ok(blog_id)
}

pub async fn get_blog(pool: &PgPool, url: &str) -> Result<Option<Blog>, StoreError> {
    let row = sqlx::query(
        "SELECT id, url, title, author, published_date, content, language, word_count, crawled_at \
         FROM blogs WHERE url = $1",
    )
    .bind(url)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(blog_from_row))
}

/// Persist a summary with its embedding. Replaces any previous summary for
/// the blog (zero-or-one per blog).
pub async fn save_summary(
    pool: &PgPool,
    blog_id: Uuid,
    blog_url: &str,
    summary_text: &str,
    key_points: &[String],
    embedding: Option<Vec<f32>>,
) -> Result<Uuid, StoreError> {
    sqlx::query("DELETE FROM summaries WHERE blog_id = $1")
        .bind(blog_id)
        .execute(pool)
        .await?;

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO summaries (id, blog_id, blog_url, summary_text, key_points, embedding) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(id)
    .bind(blog_id)
    .bind(blog_url)
    .bind(summary_text)
    .bind(key_points)
    .bind(embedding.map(Vector::from))
    .execute(pool)
    .await?;

    debug!("Saved summary for blog {}", blog_id);
    Ok(id)
}

/// Summary for a URL, if one has been generated.
pub async fn get_summary(pool: &PgPool, url: &str) -> Result<Option<Summary>, StoreError> {
    let row = sqlx::query(
        "SELECT id, blog_id, blog_url, summary_text, key_points, created_at \
         FROM summaries WHERE blog_url = $1",
    )
    .bind(url)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| Summary {
        id: r.get("id"),
        blog_id: r.get("blog_id"),
        blog_url: r.get("blog_url"),
        summary_text: r.get("summary_text"),
        key_points: r.get("key_points"),
        created_at: r.get("created_at"),
    }))
}

/// Persist generated question/answer pairs with optional embeddings.
///
/// `embeddings`, when present, is index-aligned with `pairs`.
pub async fn save_questions(
    pool: &PgPool,
    blog_id: Uuid,
    blog_url: &str,
    pairs: &[(String, String)],
    embeddings: Option<&[Vec<f32>]>,
) -> Result<Vec<Uuid>, StoreError> {
    let mut ids = Vec::with_capacity(pairs.len());
    for (i, (question, answer)) in pairs.iter().enumerate() {
        let id = Uuid::new_v4();
        let embedding = embeddings
            .and_then(|e| e.get(i))
            .map(|v| Vector::from(v.clone()));
        sqlx::query(
            "INSERT INTO questions (id, blog_id, blog_url, question, answer, embedding) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(blog_id)
        .bind(blog_url)
        .bind(question)
        .bind(answer)
        .bind(embedding)
        .execute(pool)
        .await?;
        ids.push(id);
    }

    info!("Saved {} questions for blog {}", ids.len(), blog_id);
    Ok(ids)
}

/// Questions for a URL, insertion order. `limit = None` returns all.
pub async fn get_questions(
    pool: &PgPool,
    url: &str,
    limit: Option<i64>,
) -> Result<Vec<Question>, StoreError> {
    let rows = sqlx::query(
        "SELECT id, blog_id, blog_url, question, answer, created_at \
         FROM questions WHERE blog_url = $1 ORDER BY created_at \
         LIMIT $2",
    )
    .bind(url)
    .bind(limit.unwrap_or(i64::MAX))
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(question_from_row).collect())
}

/// Delete a blog; the summary and questions cascade with it.
pub async fn delete_blog(pool: &PgPool, blog_id: Uuid) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM blogs WHERE id = $1")
        .bind(blog_id)
        .execute(pool)
        .await?;
    let deleted = result.rows_affected() > 0;
    if deleted {
        info!("Deleted blog {} (cascade to summary and questions)", blog_id);
    }
    Ok(deleted)
}
