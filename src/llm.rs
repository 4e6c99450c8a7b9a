//! Chat completion client.
//!
//! [`AnswerSynthesizer`] is the seam the conversational pipeline depends on;
//! [`OpenAiChat`] is the OpenAI-compatible implementation (`POST
//! {api_base}/chat/completions`, `OPENAI_API_KEY` from the environment).
//! Transient failures retry with the same backoff policy the embedding
//! clients use: 429 and 5xx retry, other 4xx fail immediately.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::embed::post_json_with_retry;

/// One message in a chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Produces an answer from a fully assembled message sequence.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// OpenAI-compatible chat completion client.
pub struct OpenAiChat {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OpenAiChat {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl AnswerSynthesizer for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
        });

        let json = post_json_with_retry(
            &self.client,
            &url,
            Some(&api_key),
            &body,
            self.config.max_retries,
            "Chat completion",
        )
        .await?;

        parse_completion(&json)
    }
}

fn parse_completion(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing message content"))?;

    Ok(content.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_roles() {
        assert_eq!(ChatMessage::system("a").role, "system");
        assert_eq!(ChatMessage::user("b").role, "user");
        assert_eq!(ChatMessage::assistant("c").role, "assistant");
    }

    #[test]
    fn test_parse_completion_trims_content() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "  The answer.\n" } }
            ]
        });
        assert_eq!(parse_completion(&json).unwrap(), "The answer.");
    }

    #[test]
    fn test_parse_completion_rejects_empty_choices() {
        let json = serde_json::json!({ "choices": [] });
        assert!(parse_completion(&json).is_err());
    }

    #[test]
    fn test_messages_serialize_for_the_api() {
        let msgs = vec![ChatMessage::system("s"), ChatMessage::user("q")];
        let json = serde_json::to_value(&msgs).unwrap();
        assert_eq!(json[0]["role"], "system");
        assert_eq!(json[1]["content"], "q");
    }
}
