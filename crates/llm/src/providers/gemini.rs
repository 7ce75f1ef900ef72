//! Google Gemini generateContent backend.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use blogqa_core::config::LlmConfig;

use crate::client::{http_client, send_json};
use crate::provider::{LlmError, LlmProvider, Message, Role};

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn from_config(model: &str, config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .gemini_api_key
            .clone()
            .ok_or_else(|| LlmError::NotConfigured("GEMINI_API_KEY not set".into()))?;
        Ok(Self {
            client: http_client(),
            api_key,
            model: model.to_string(),
        })
    }

    /// Build the request body for the Gemini generateContent API.
    fn build_request_body(
        messages: &[Message],
        temperature: f32,
        max_tokens: u32,
    ) -> serde_json::Value {
        // Gemini uses a separate system_instruction field (like Claude)
        let system_msg = messages
            .iter()
            .find(|m| matches!(m.role, Role::System))
            .map(|m| m.content.clone());

        let contents: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| !matches!(m.role, Role::System))
            .map(|m| {
                json!({
                    "role": match m.role {
                        Role::User => "user",
                        Role::Assistant => "model",
                        Role::System => unreachable!(),
                    },
                    "parts": [{ "text": m.content }],
                })
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": max_tokens,
            },
        });

        if let Some(system) = system_msg {
            body["system_instruction"] = json!({
                "parts": [{ "text": system }],
            });
        }

        body
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key,
        );

        let body = Self::build_request_body(&messages, temperature, max_tokens);

        debug!("Gemini generateContent call (model {})", self.model);

        let response: serde_json::Value = send_json(self.client.post(&url).json(&body)).await?;

        response["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|text| text.to_string())
            .ok_or_else(|| {
                LlmError::ParseError("missing candidates[0].content.parts[0].text".into())
            })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_message_moves_to_system_instruction() {
        let messages = vec![
            Message::system("You are terse."),
            Message::user("Summarize this."),
        ];
        let body = GeminiProvider::build_request_body(&messages, 0.5, 256);

        assert_eq!(
            body["system_instruction"]["parts"][0]["text"],
            "You are terse."
        );
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
    }

    #[test]
    fn assistant_role_maps_to_model() {
        let messages = vec![
            Message::user("hi"),
            Message {
                role: Role::Assistant,
                content: "hello".into(),
            },
        ];
        let body = GeminiProvider::build_request_body(&messages, 0.5, 256);
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents[1]["role"], "model");
    }
}
