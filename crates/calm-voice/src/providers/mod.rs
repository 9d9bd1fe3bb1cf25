//! Provider adapters: Deepgram (speech-to-text), Anthropic (replies), ElevenLabs
//! (text-to-speech), plus canned placeholders for offline runs.

pub mod anthropic;
pub mod deepgram;
pub mod elevenlabs;
pub mod placeholder;

pub use anthropic::AnthropicReplier;
pub use deepgram::DeepgramTranscriber;
pub use elevenlabs::ElevenLabsSynthesizer;
pub use placeholder::{PlaceholderReplier, PlaceholderTranscriber, SilentSynthesizer};

use crate::config::{ProviderConfig, ProviderMode};
use crate::error::{VoiceError, VoiceResult};
use crate::orchestrator::Capabilities;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Which provider keys are configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderHealth {
    pub deepgram: bool,
    pub claude: bool,
    pub elevenlabs: bool,
}

impl ProviderHealth {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            deepgram: config.deepgram_api_key.is_some(),
            claude: config.anthropic_api_key.is_some(),
            elevenlabs: config.elevenlabs_api_key.is_some(),
        }
    }

    pub fn all_configured(&self) -> bool {
        self.deepgram && self.claude && self.elevenlabs
    }

    pub fn log(&self) {
        let mark = |ok: bool| if ok { "✅" } else { "❌" };
        info!(
            "🔑 API keys: Deepgram {} | Claude {} | ElevenLabs {}",
            mark(self.deepgram),
            mark(self.claude),
            mark(self.elevenlabs)
        );
    }
}

/// Build the capability set for the selected provider mode.
///
/// Live mode needs Deepgram and Anthropic keys. Without an ElevenLabs key replies are
/// text only.
pub fn build_capabilities(config: &ProviderConfig) -> VoiceResult<Capabilities> {
    match config.mode {
        ProviderMode::Placeholder => {
            warn!("🧪 placeholder providers selected, no backend will be called");
            Ok(Capabilities {
                transcriber: Arc::new(PlaceholderTranscriber::default()),
                replier: Arc::new(PlaceholderReplier::default()),
                synthesizer: Arc::new(SilentSynthesizer),
            })
        }
        ProviderMode::Live => {
            let deepgram_key = config.deepgram_api_key.as_deref().ok_or_else(|| {
                VoiceError::Config("DEEPGRAM_API_KEY is not set".to_string())
            })?;
            let anthropic_key = config.anthropic_api_key.as_deref().ok_or_else(|| {
                VoiceError::Config("ANTHROPIC_API_KEY is not set".to_string())
            })?;

            let transcriber =
                DeepgramTranscriber::new(&config.deepgram_url, deepgram_key, &config.stt_model)?;
            let replier =
                AnthropicReplier::new(&config.anthropic_url, anthropic_key, &config.reply_model)?
                    .with_sampling(config.max_tokens, config.temperature);
            let synthesizer: Arc<dyn crate::capability::SpeechSynthesizer> =
                match config.elevenlabs_api_key.as_deref() {
                    Some(key) => Arc::new(ElevenLabsSynthesizer::new(
                        &config.elevenlabs_url,
                        key,
                        &config.elevenlabs_voice_id,
                        &config.tts_model,
                    )?),
                    None => {
                        warn!("ELEVENLABS_API_KEY is not set, replies will not be spoken");
                        Arc::new(SilentSynthesizer)
                    }
                };

            Ok(Capabilities {
                transcriber: Arc::new(transcriber),
                replier: Arc::new(replier),
                synthesizer,
            })
        }
    }
}
