//! External capabilities consumed by the orchestrator.
//!
//! Implement these for a concrete provider (see `providers`) or for a test double.
//! The orchestrator only sees these signatures, never a wire format.

use crate::conversation::ChatMessage;
use crate::error::VoiceResult;
use crate::recorder::Utterance;
use async_trait::async_trait;
use std::path::Path;

/// A playable audio resource produced by speech synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioResource {
    pub bytes: Vec<u8>,
    /// MIME type, e.g. `audio/mpeg`.
    pub content_type: String,
}

impl AudioResource {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    /// Read a clip from disk, guessing the MIME type from the extension.
    pub async fn from_file(path: impl AsRef<Path>) -> VoiceResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let content_type = match path.extension().and_then(|e| e.to_str()) {
            Some("mp3") => "audio/mpeg",
            Some("wav") => "audio/wav",
            Some("ogg") => "audio/ogg",
            _ => "application/octet-stream",
        };
        Ok(Self::new(bytes, content_type))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Speech to text. Fails with `VoiceError::Transcription`.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, utterance: &Utterance) -> VoiceResult<String>;
}

/// Text to reply. Fails with `VoiceError::Reply`.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate_reply(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
    ) -> VoiceResult<String>;
}

/// Reply to speech. `Ok(None)` when synthesis is unavailable; errors are downgraded to
/// `None` by the orchestrator.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> VoiceResult<Option<AudioResource>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn clip_type_follows_extension() {
        let mut file = tempfile::Builder::new().suffix(".mp3").tempfile().unwrap();
        file.write_all(&[0xFF, 0xFB, 0x90]).unwrap();
        let clip = AudioResource::from_file(file.path()).await.unwrap();
        assert_eq!(clip.content_type, "audio/mpeg");
        assert_eq!(clip.len(), 3);
    }

    #[tokio::test]
    async fn missing_clip_is_an_io_error() {
        let err = AudioResource::from_file("/nonexistent/welcome.mp3")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::VoiceError::Io(_)));
    }
}
