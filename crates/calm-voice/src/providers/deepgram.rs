//! Deepgram speech-to-text adapter.

use crate::capability::Transcriber;
use crate::error::{VoiceError, VoiceResult};
use crate::recorder::Utterance;
use async_trait::async_trait;
use tracing::debug;

/// Transcribes compiled utterances with Deepgram's prerecorded `listen` endpoint.
#[derive(Debug, Clone)]
pub struct DeepgramTranscriber {
    /// Base URL without trailing slash (e.g. https://api.deepgram.com/v1).
    pub base_url: String,
    api_key: String,
    /// Model, e.g. nova-2.
    pub model: String,
    client: reqwest::Client,
}

impl DeepgramTranscriber {
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
            client,
        })
    }

    fn listen_url(&self) -> String {
        format!(
            "{}/listen?model={}&smart_format=true",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl Transcriber for DeepgramTranscriber {
    async fn transcribe(&self, utterance: &Utterance) -> VoiceResult<String> {
        let res = self
            .client
            .post(self.listen_url())
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(utterance.audio().to_vec())
            .send()
            .await
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::Transcription(format!(
                "Deepgram API error {}: {}",
                status, body
            )));
        }
        let json: serde_json::Value = res
            .json()
            .await
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;
        let text = parse_transcript(&json)?;
        debug!(chars = text.len(), "deepgram transcript received");
        Ok(text)
    }
}

/// Extract `results.channels[0].alternatives[0].transcript`.
pub fn parse_transcript(json: &serde_json::Value) -> VoiceResult<String> {
    json.pointer("/results/channels/0/alternatives/0/transcript")
        .and_then(|t| t.as_str())
        .map(|t| t.to_string())
        .ok_or_else(|| {
            VoiceError::Transcription("Deepgram response missing transcript".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_first_alternative() {
        let body = json!({
            "results": {"channels": [{"alternatives": [
                {"transcript": "I lost my temper again", "confidence": 0.98},
                {"transcript": "I lost my temple again"}
            ]}]}
        });
        assert_eq!(parse_transcript(&body).unwrap(), "I lost my temper again");
    }

    #[test]
    fn empty_transcript_is_not_an_error() {
        let body = json!({"results": {"channels": [{"alternatives": [{"transcript": ""}]}]}});
        assert_eq!(parse_transcript(&body).unwrap(), "");
    }

    #[test]
    fn missing_transcript_is_a_transcription_error() {
        let err = parse_transcript(&json!({"results": {"channels": []}})).unwrap_err();
        assert!(matches!(err, VoiceError::Transcription(_)));
    }

    #[test]
    fn listen_url_carries_model() {
        let stt =
            DeepgramTranscriber::new("https://api.deepgram.com/v1/", "key", "nova-2").unwrap();
        assert_eq!(
            stt.listen_url(),
            "https://api.deepgram.com/v1/listen?model=nova-2&smart_format=true"
        );
    }
}
