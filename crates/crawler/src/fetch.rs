use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use blogqa_core::config::CrawlerConfig;

use crate::error::CrawlError;
use crate::extract;

/// A fully crawled and extracted blog page.
#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub published_date: Option<String>,
    pub content: String,
    pub language: Option<String>,
    pub word_count: usize,
    pub crawled_at: DateTime<Utc>,
}

/// Blog fetcher with a browser-like user agent and a hard timeout.
pub struct Crawler {
    client: reqwest::Client,
    min_word_count: usize,
}

impl Crawler {
    pub fn new(config: &CrawlerConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            min_word_count: config.min_word_count,
        }
    }

    /// Fetch the URL and extract the article.
    ///
    /// 4xx responses are fatal; 5xx, network failures, and below-minimum
    /// extractions are retryable (see [`CrawlError::is_retryable`]).
    pub async fn crawl(&self, url: &str) -> Result<CrawledPage, CrawlError> {
        debug!("Fetching {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(CrawlError::Status {
                status,
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        let extracted = extract::extract(&body);

        if extracted.word_count < self.min_word_count {
            return Err(CrawlError::EmptyContent {
                word_count: extracted.word_count,
                minimum: self.min_word_count,
            });
        }

        info!(
            "Crawled {} ({} words, lang {})",
            url,
            extracted.word_count,
            extracted.language.as_deref().unwrap_or("unknown"),
        );

        Ok(CrawledPage {
            url: url.to_string(),
            title: extracted.title,
            author: extracted.author,
            published_date: extracted.published_date,
            content: extracted.content,
            language: extracted.language,
            word_count: extracted.word_count,
            crawled_at: Utc::now(),
        })
    }
}
