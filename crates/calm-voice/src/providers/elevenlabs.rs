//! ElevenLabs text-to-speech adapter.

use crate::capability::{AudioResource, SpeechSynthesizer};
use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
        }
    }
}

/// Synthesizes replies through `POST /v1/text-to-speech/{voice_id}` (MP3).
#[derive(Debug, Clone)]
pub struct ElevenLabsSynthesizer {
    /// Base URL without trailing slash (e.g. https://api.elevenlabs.io/v1).
    pub base_url: String,
    api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub settings: VoiceSettings,
    client: reqwest::Client,
}

impl ElevenLabsSynthesizer {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        voice_id: impl Into<String>,
        model_id: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            voice_id: voice_id.into(),
            model_id: model_id.into(),
            settings: VoiceSettings::default(),
            client,
        })
    }

    fn speech_url(&self) -> String {
        format!(
            "{}/text-to-speech/{}",
            self.base_url.trim_end_matches('/'),
            self.voice_id
        )
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str) -> VoiceResult<Option<AudioResource>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let body = SpeechRequest {
            text,
            model_id: &self.model_id,
            voice_settings: self.settings,
        };
        let res = self
            .client
            .post(self.speech_url())
            .header("Accept", "audio/mpeg")
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::Synthesis(format!(
                "ElevenLabs API error {}: {}",
                status, body
            )));
        }
        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?;
        debug!(bytes = bytes.len(), "elevenlabs audio received");
        Ok(Some(AudioResource::new(bytes.to_vec(), content_type)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speech_url_includes_voice() {
        let tts = ElevenLabsSynthesizer::new(
            "https://api.elevenlabs.io/v1",
            "key",
            "EXAVITQu4vr4xnSDxMaL",
            "eleven_monolingual_v1",
        )
        .unwrap();
        assert_eq!(
            tts.speech_url(),
            "https://api.elevenlabs.io/v1/text-to-speech/EXAVITQu4vr4xnSDxMaL"
        );
    }

    #[test]
    fn request_carries_voice_settings() {
        let body = SpeechRequest {
            text: "hello",
            model_id: "eleven_monolingual_v1",
            voice_settings: VoiceSettings::default(),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["voice_settings"]["stability"], 0.5);
        assert_eq!(value["voice_settings"]["similarity_boost"], 0.75);
        assert_eq!(value["model_id"], "eleven_monolingual_v1");
    }

    #[tokio::test]
    async fn blank_text_produces_no_audio() {
        let tts = ElevenLabsSynthesizer::new("http://127.0.0.1:9", "key", "v", "m").unwrap();
        assert!(tts.synthesize("   ").await.unwrap().is_none());
    }
}
