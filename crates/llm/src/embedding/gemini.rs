//! Gemini embeddings backend.
//!
//! The embedContent API takes one text per call, so batches loop.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use blogqa_core::config::{EmbeddingConfig, LlmConfig};

use crate::client::{http_client, send_json};

use super::traits::{ensure_dimensions, Embedder, EmbeddingError};

pub struct GeminiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl GeminiEmbedder {
    pub fn from_config(
        model: &str,
        llm: &LlmConfig,
        embedding: &EmbeddingConfig,
    ) -> Result<Self, EmbeddingError> {
        let api_key = llm
            .gemini_api_key
            .clone()
            .ok_or_else(|| EmbeddingError::NotConfigured("GEMINI_API_KEY not set".into()))?;
        Ok(Self {
            client: http_client(),
            api_key,
            model: model.to_string(),
            dimensions: embedding.dimensions,
        })
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:embedContent?key={}",
            self.model, self.api_key,
        );

        let body = json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
        });

        let response: EmbedContentResponse =
            send_json(self.client.post(&url).json(&body)).await?;
        let vector = response.embedding.values;
        ensure_dimensions(self.dimensions, &vector)?;
        Ok(vector)
    }
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_one(text).await?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
