//! OpenAI embeddings backend.
//!
//! One `/v1/embeddings` call per batch. The API may return items out of
//! order, so results are slotted back by the index the provider reports.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use blogqa_core::config::{EmbeddingConfig, LlmConfig};

use crate::client::{http_client, send_json};

use super::traits::{ensure_dimensions, Embedder, EmbeddingError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn from_config(
        model: &str,
        llm: &LlmConfig,
        embedding: &EmbeddingConfig,
    ) -> Result<Self, EmbeddingError> {
        let api_key = llm
            .openai_api_key
            .clone()
            .ok_or_else(|| EmbeddingError::NotConfigured("OPENAI_API_KEY not set".into()))?;
        Ok(Self {
            client: http_client(),
            api_key,
            model: model.to_string(),
            base_url: llm
                .openai_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            dimensions: embedding.dimensions,
        })
    }
}

// ── Wire types ────────────────────────────────────────────────

#[derive(Serialize)]
struct BatchRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct BatchResponse {
    data: Vec<BatchItem>,
}

#[derive(Deserialize)]
struct BatchItem {
    index: usize,
    embedding: Vec<f32>,
}

/// Restore input order from the per-item indices and check every slot got
/// a vector of the configured width.
fn collect_ordered(
    items: Vec<BatchItem>,
    expected_len: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut vectors: Vec<Option<Vec<f32>>> = (0..expected_len).map(|_| None).collect();
    for item in items {
        ensure_dimensions(dimensions, &item.embedding)?;
        match vectors.get_mut(item.index) {
            Some(slot) => *slot = Some(item.embedding),
            None => {
                return Err(EmbeddingError::Api(format!(
                    "response index {} out of range for batch of {}",
                    item.index, expected_len,
                )))
            }
        }
    }

    vectors
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.ok_or_else(|| EmbeddingError::Api(format!("no embedding returned for input {i}")))
        })
        .collect()
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = BatchRequest {
            model: &self.model,
            input: texts,
        };

        let response: BatchResponse = send_json(
            self.client
                .post(format!("{}/v1/embeddings", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&request),
        )
        .await?;

        collect_ordered(response.data, texts.len(), self.dimensions)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: usize, embedding: Vec<f32>) -> BatchItem {
        BatchItem { index, embedding }
    }

    #[test]
    fn out_of_order_items_are_slotted_back() {
        let items = vec![item(1, vec![1.0, 1.0]), item(0, vec![0.0, 0.0])];
        let vectors = collect_ordered(items, 2, 2).unwrap();
        assert_eq!(vectors[0], vec![0.0, 0.0]);
        assert_eq!(vectors[1], vec![1.0, 1.0]);
    }

    #[test]
    fn missing_slot_is_an_api_error() {
        let items = vec![item(0, vec![0.0, 0.0])];
        let err = collect_ordered(items, 2, 2).unwrap_err();
        assert!(matches!(err, EmbeddingError::Api(_)));
    }

    #[test]
    fn out_of_range_index_is_an_api_error() {
        let items = vec![item(5, vec![0.0, 0.0])];
        let err = collect_ordered(items, 1, 2).unwrap_err();
        assert!(matches!(err, EmbeddingError::Api(_)));
    }

    #[test]
    fn wrong_width_vector_is_rejected() {
        let items = vec![item(0, vec![0.0, 0.0, 0.0])];
        let err = collect_ordered(items, 1, 2).unwrap_err();
        assert!(matches!(err, EmbeddingError::DimensionMismatch { .. }));
    }
}
