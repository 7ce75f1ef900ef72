//! The processing pipeline for one leased queue entry:
//! crawl → persist blog → summary → summary embedding → questions →
//! question embeddings → persist questions.
//!
//! Terminal transitions, audit writes, and slot accounting stay in the
//! runtime; this module only produces content or a typed error.

use sqlx::PgPool;
use tracing::info;

use blogqa_core::Config;
use blogqa_crawler::Crawler;
use blogqa_llm::prompt;
use blogqa_llm::{create_embedder, create_provider, parse_questions, parse_summary, Message};
use blogqa_store::{content, NewBlog, Publisher, QueueEntry};

use crate::error::ProcessError;

/// What a successful run produced, for the audit snapshot.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub blog_title: String,
    pub content_length: i32,
    pub summary_length: i32,
    pub question_count: i32,
    pub embedding_count: i32,
}

pub async fn process_entry(
    pool: &PgPool,
    config: &Config,
    crawler: &Crawler,
    entry: &QueueEntry,
    publisher: &Publisher,
) -> Result<ProcessOutcome, ProcessError> {
    let url = &entry.url;

    // 1. Crawl.
    let page = crawler.crawl(url).await?;

    // 2. Persist the blog (idempotent on URL).
    let blog_id = content::save_blog(
        pool,
        &NewBlog {
            url: url.clone(),
            title: page.title.clone(),
            author: page.author.clone(),
            published_date: page.published_date.clone(),
            content: page.content.clone(),
            language: page.language.clone(),
            word_count: page.word_count as i32,
        },
    )
    .await?;

    // 3. Summary.
    let provider = create_provider(&publisher.config.llm_model, &config.llm)?;
    let summary_system =
        prompt::summary_system_prompt(publisher.config.custom_summary_prompt.as_deref());
    let article = prompt::article_user_prompt(&page.title, url, &page.content);

    let raw_summary = provider
        .complete(
            vec![Message::system(summary_system), Message::user(article.clone())],
            config.llm.temperature,
            config.llm.max_tokens,
        )
        .await?;
    let summary = parse_summary(&raw_summary)?;

    // 4. Embed + persist the summary.
    let embedder = create_embedder(&publisher.config.embedding_model, &config.llm, &config.embedding)?;
    let summary_embedding = embedder.embed(&summary.summary).await?;
    content::save_summary(
        pool,
        blog_id,
        url,
        &summary.summary,
        &summary.key_points,
        Some(summary_embedding),
    )
    .await?;

    // 5. Questions.
    let question_system = prompt::question_system_prompt(
        publisher.config.questions_per_blog.max(1) as u32,
        publisher.config.custom_question_prompt.as_deref(),
    );
    let raw_questions = provider
        .complete(
            vec![Message::system(question_system), Message::user(article)],
            config.llm.temperature,
            config.llm.max_tokens,
        )
        .await?;
    let questions = parse_questions(&raw_questions)?;

    // 6. Embed every question in one provider batch.
    let question_texts: Vec<&str> = questions.iter().map(|q| q.question.as_str()).collect();
    let question_embeddings = embedder.embed_batch(&question_texts).await?;

    // 7. Persist questions.
    let pairs: Vec<(String, String)> = questions
        .into_iter()
        .map(|q| (q.question, q.answer))
        .collect();
    content::save_questions(pool, blog_id, url, &pairs, Some(question_embeddings.as_slice())).await?;

    let outcome = ProcessOutcome {
        blog_title: page.title,
        content_length: page.content.len() as i32,
        summary_length: summary.summary.len() as i32,
        question_count: pairs.len() as i32,
        embedding_count: 1 + question_embeddings.len() as i32,
    };

    info!(
        "Processed {}: {} questions, summary {} chars",
        url, outcome.question_count, outcome.summary_length,
    );

    Ok(outcome)
}
