pub mod claude;
pub mod gemini;
pub mod openai;

use blogqa_core::config::LlmConfig;

use crate::provider::{LlmError, LlmProvider};

/// Create the provider for a publisher-configured chat model.
///
/// The model name picks the backend: `claude-*` goes to Anthropic,
/// `gemini-*` to Google, everything else to the OpenAI-compatible API.
/// Key resolution lives with each backend.
pub fn create_provider(model: &str, config: &LlmConfig) -> Result<Box<dyn LlmProvider>, LlmError> {
    if model.starts_with("claude") {
        Ok(Box::new(claude::ClaudeProvider::from_config(model, config)?))
    } else if model.starts_with("gemini") {
        Ok(Box::new(gemini::GeminiProvider::from_config(model, config)?))
    } else {
        Ok(Box::new(openai::OpenAiProvider::from_config(model, config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_keys() -> LlmConfig {
        LlmConfig {
            openai_api_key: Some("sk-test".into()),
            openai_base_url: None,
            anthropic_api_key: Some("ak-test".into()),
            gemini_api_key: Some("gk-test".into()),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    #[test]
    fn routes_by_model_prefix() {
        let cfg = config_with_keys();
        assert_eq!(
            create_provider("claude-sonnet-4-20250514", &cfg).unwrap().model(),
            "claude-sonnet-4-20250514"
        );
        assert_eq!(
            create_provider("gemini-2.0-flash", &cfg).unwrap().model(),
            "gemini-2.0-flash"
        );
        assert_eq!(
            create_provider("gpt-4o-mini", &cfg).unwrap().model(),
            "gpt-4o-mini"
        );
    }

    #[test]
    fn missing_key_is_not_configured() {
        let cfg = LlmConfig {
            openai_api_key: None,
            openai_base_url: None,
            anthropic_api_key: None,
            gemini_api_key: None,
            temperature: 0.7,
            max_tokens: 1024,
        };
        assert!(matches!(
            create_provider("gpt-4o-mini", &cfg),
            Err(LlmError::NotConfigured(_))
        ));
        assert!(matches!(
            create_provider("claude-haiku-4", &cfg),
            Err(LlmError::NotConfigured(_))
        ));
    }
}
