//! Canned providers for running a session without any backend.
//!
//! Only used when `ProviderMode::Placeholder` is selected explicitly; a live provider
//! failure never falls back to these.

use crate::capability::{AudioResource, ReplyGenerator, SpeechSynthesizer, Transcriber};
use crate::conversation::ChatMessage;
use crate::error::VoiceResult;
use crate::recorder::Utterance;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub const PLACEHOLDER_TRANSCRIPT: &str =
    "Sample transcription: I am feeling very frustrated with my child today...";

pub const PLACEHOLDER_REPLY: &str = "I understand that you're feeling frustrated. Parenting is challenging, and it's okay to feel overwhelmed. Let's take this step by step together.";

/// Returns a fixed transcript after a simulated delay.
#[derive(Debug, Clone)]
pub struct PlaceholderTranscriber {
    pub text: String,
    pub latency: Duration,
}

impl Default for PlaceholderTranscriber {
    fn default() -> Self {
        Self {
            text: PLACEHOLDER_TRANSCRIPT.to_string(),
            latency: Duration::from_millis(1500),
        }
    }
}

#[async_trait]
impl Transcriber for PlaceholderTranscriber {
    async fn transcribe(&self, utterance: &Utterance) -> VoiceResult<String> {
        debug!(bytes = utterance.len(), "placeholder transcription");
        tokio::time::sleep(self.latency).await;
        Ok(self.text.clone())
    }
}

/// Returns a fixed coaching reply after a simulated delay.
#[derive(Debug, Clone)]
pub struct PlaceholderReplier {
    pub text: String,
    pub latency: Duration,
}

impl Default for PlaceholderReplier {
    fn default() -> Self {
        Self {
            text: PLACEHOLDER_REPLY.to_string(),
            latency: Duration::from_millis(2000),
        }
    }
}

#[async_trait]
impl ReplyGenerator for PlaceholderReplier {
    async fn generate_reply(
        &self,
        _system_prompt: &str,
        messages: &[ChatMessage],
    ) -> VoiceResult<String> {
        debug!(messages = messages.len(), "placeholder reply");
        tokio::time::sleep(self.latency).await;
        Ok(self.text.clone())
    }
}

/// Synthesis is unavailable: every reply is text only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSynthesizer;

#[async_trait]
impl SpeechSynthesizer for SilentSynthesizer {
    async fn synthesize(&self, _text: &str) -> VoiceResult<Option<AudioResource>> {
        Ok(None)
    }
}
