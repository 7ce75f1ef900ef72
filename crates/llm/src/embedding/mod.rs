mod gemini;
mod openai;
mod traits;

pub use gemini::GeminiEmbedder;
pub use openai::OpenAiEmbedder;
pub use traits::{Embedder, EmbeddingError};

use blogqa_core::config::{EmbeddingConfig, LlmConfig};

/// Create the embedding backend for a publisher-configured model.
///
/// `gemini-*` models go to Google; everything else (`text-embedding-*`)
/// to the OpenAI-compatible API. Key resolution lives with each backend.
pub fn create_embedder(
    model: &str,
    llm: &LlmConfig,
    embedding: &EmbeddingConfig,
) -> Result<Box<dyn Embedder>, EmbeddingError> {
    if model.starts_with("gemini") {
        Ok(Box::new(GeminiEmbedder::from_config(model, llm, embedding)?))
    } else {
        Ok(Box::new(OpenAiEmbedder::from_config(model, llm, embedding)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_requires_matching_key() {
        let llm = LlmConfig {
            openai_api_key: None,
            openai_base_url: None,
            anthropic_api_key: None,
            gemini_api_key: None,
            temperature: 0.7,
            max_tokens: 1024,
        };
        let emb = EmbeddingConfig { dimensions: 1536 };
        assert!(matches!(
            create_embedder("text-embedding-3-small", &llm, &emb),
            Err(EmbeddingError::NotConfigured(_))
        ));

        let llm = LlmConfig {
            openai_api_key: Some("sk-test".into()),
            ..llm
        };
        let embedder = create_embedder("text-embedding-3-small", &llm, &emb).unwrap();
        assert_eq!(embedder.dimensions(), 1536);
    }
}
