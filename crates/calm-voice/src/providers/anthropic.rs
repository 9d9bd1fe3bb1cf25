//! Anthropic Messages API reply adapter.

use crate::capability::ReplyGenerator;
use crate::conversation::ChatMessage;
use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: Vec<&'a ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

/// Generates coaching replies through `POST /v1/messages`.
#[derive(Debug, Clone)]
pub struct AnthropicReplier {
    /// Base URL without trailing slash (e.g. https://api.anthropic.com/v1).
    pub base_url: String,
    api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    client: reqwest::Client,
}

impl AnthropicReplier {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 200,
            temperature: 0.7,
            client,
        })
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }
}

/// Drop messages with blank content; the API rejects them.
pub fn valid_messages(messages: &[ChatMessage]) -> Vec<&ChatMessage> {
    messages
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .collect()
}

/// Extract `content[0].text`.
pub fn parse_reply(json: &serde_json::Value) -> VoiceResult<String> {
    json.pointer("/content/0/text")
        .and_then(|t| t.as_str())
        .map(|t| t.to_string())
        .ok_or_else(|| VoiceError::Reply("Invalid response from Anthropic API".to_string()))
}

#[async_trait]
impl ReplyGenerator for AnthropicReplier {
    async fn generate_reply(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
    ) -> VoiceResult<String> {
        let messages = valid_messages(messages);
        if messages.is_empty() {
            return Err(VoiceError::Reply("No valid messages to send".to_string()));
        }
        let body = MessagesRequest {
            model: &self.model,
            system: system_prompt,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        let url = format!("{}/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Reply(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::Reply(format!(
                "Anthropic API error {}: {}",
                status, body
            )));
        }
        let json: serde_json::Value = res
            .json()
            .await
            .map_err(|e| VoiceError::Reply(e.to_string()))?;
        let reply = parse_reply(&json)?;
        debug!(chars = reply.len(), "anthropic reply received");
        Ok(reply)
    }
}
