//! Anthropic Messages API backend.
//!
//! The Messages API takes the system prompt as a top-level field, so the
//! conversation is partitioned before serialization instead of mapped 1:1.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use blogqa_core::config::LlmConfig;

use crate::client::{http_client, send_json};
use crate::provider::{LlmError, LlmProvider, Message, Role};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct ClaudeProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl ClaudeProvider {
    pub fn from_config(model: &str, config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .anthropic_api_key
            .clone()
            .ok_or_else(|| LlmError::NotConfigured("ANTHROPIC_API_KEY not set".into()))?;
        Ok(Self {
            client: http_client(),
            api_key,
            model: model.to_string(),
        })
    }
}

// ── Wire types ────────────────────────────────────────────────

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    messages: Vec<Turn<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Serialize)]
struct Turn<'a> {
    role: &'static str,
    content: &'a str,
}

/// Split the conversation into the top-level system prompt and the turn
/// list the Messages API expects.
fn partition<'a>(messages: &'a [Message]) -> (Option<&'a str>, Vec<Turn<'a>>) {
    let mut system = None;
    let mut turns = Vec::with_capacity(messages.len());
    for message in messages {
        match message.role {
            Role::System => {
                if system.is_none() {
                    system = Some(message.content.as_str());
                }
            }
            Role::User => turns.push(Turn {
                role: "user",
                content: &message.content,
            }),
            Role::Assistant => turns.push(Turn {
                role: "assistant",
                content: &message.content,
            }),
        }
    }
    (system, turns)
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let (system, turns) = partition(&messages);
        let request = MessagesRequest {
            model: &self.model,
            messages: turns,
            temperature,
            max_tokens,
            system,
        };

        debug!("Claude messages call (model {})", self.model);

        let response: MessagesResponse = send_json(
            self.client
                .post(MESSAGES_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&request),
        )
        .await?;

        response
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| LlmError::ParseError("response carried no text block".into()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_lifts_system_out_of_the_turns() {
        let messages = vec![
            Message::system("You are terse."),
            Message::user("Summarize this."),
            Message {
                role: Role::Assistant,
                content: "Done.".into(),
            },
        ];
        let (system, turns) = partition(&messages);
        assert_eq!(system, Some("You are terse."));
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[1].role, "assistant");
    }

    #[test]
    fn request_omits_system_when_absent() {
        let messages = vec![Message::user("hi")];
        let (system, turns) = partition(&messages);
        let request = MessagesRequest {
            model: "claude-sonnet-4-20250514",
            messages: turns,
            temperature: 0.5,
            max_tokens: 128,
            system,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn first_text_block_wins() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content": [{"type": "thinking"}, {"type": "text", "text": "answer"}]}"#,
        )
        .unwrap();
        assert_eq!(
            response.content.into_iter().find_map(|b| b.text).as_deref(),
            Some("answer")
        );
    }
}
