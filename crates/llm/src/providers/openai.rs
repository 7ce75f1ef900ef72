//! OpenAI-compatible chat backend (also covers self-hosted gateways via
//! `OPENAI_BASE_URL`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use blogqa_core::config::LlmConfig;

use crate::client::{http_client, send_json};
use crate::provider::{LlmError, LlmProvider, Message, Role};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn from_config(model: &str, config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| LlmError::NotConfigured("OPENAI_API_KEY not set".into()))?;
        Ok(Self {
            client: http_client(),
            api_key,
            model: model.to_string(),
            base_url: config
                .openai_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

// ── Wire types ────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> WireMessage<'a> {
    fn from_message(message: &'a Message) -> Self {
        Self {
            role: match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: &message.content,
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: messages.iter().map(WireMessage::from_message).collect(),
            temperature,
            max_tokens,
        };

        debug!("OpenAI chat completion (model {})", self.model);

        let response: ChatResponse = send_json(
            self.client
                .post(format!("{}/v1/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&request),
        )
        .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::ParseError("response carried no assistant content".into()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_message_role_names() {
        let system = Message::system("be terse");
        let user = Message::user("hello");
        assert_eq!(WireMessage::from_message(&system).role, "system");
        assert_eq!(WireMessage::from_message(&user).role, "user");
    }

    #[test]
    fn chat_request_serializes_flat() {
        let messages = vec![Message::system("s"), Message::user("u")];
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: messages.iter().map(WireMessage::from_message).collect(),
            temperature: 0.2,
            max_tokens: 64,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "u");
        assert_eq!(json["max_tokens"], 64);
    }

    #[test]
    fn response_with_empty_choices_is_a_parse_error_case() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .is_none());
    }
}
