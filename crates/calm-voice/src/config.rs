//! Session and provider configuration.
//!
//! `SessionConfig` is the single record that parameterizes the orchestrator:
//! detector thresholds, pipeline noise filters, backoff, and the greeting copy.
//! The direct-start and landing-page variants are presets of the same record.

use crate::error::{VoiceError, VoiceResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Coaching preamble sent as the system prompt on every reply request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a compassionate AI coach helping overwhelmed parents. Your role is to:
1. Listen with empathy and validate their feelings
2. Help them calm down and regulate their emotions
3. Provide practical, actionable tips to rebuild relationships with their children
4. Keep responses conversational, warm, and brief (2-3 sentences max)
5. Focus on emotional support first, then practical guidance
6. Use a gentle, non-judgmental tone";

const DIRECT_GREETING: &str = "Listening... Start speaking when ready";
const LANDING_GREETING: &str = "Listening... I'm here when you need to talk";

/// Configuration for one conversation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minimum RMS loudness counted as speech (default: 0.02)
    pub volume_threshold: f32,

    /// Sustained quiet required to end an utterance (default: 2000ms)
    pub silence_hangover_ms: u64,

    /// Sampler cadence (default: 100ms)
    pub sample_interval_ms: u64,

    /// Analyser frame length in samples (default: 256)
    pub frame_size: usize,

    /// Capture sample rate in Hz (default: 16000)
    pub sample_rate: u32,

    /// Compiled utterances below this size are discarded as noise (default: 1000 bytes)
    pub min_utterance_bytes: usize,

    /// Trimmed transcripts shorter than this are discarded as noise (default: 3)
    pub min_transcript_chars: usize,

    /// Delay before listening resumes after a failed pipeline run (default: 2000ms)
    pub failure_backoff_ms: u64,

    /// Start listening as soon as the session is created
    pub auto_start: bool,

    /// Welcome clip played once before listening starts (landing: audio/i_am_here.mp3)
    pub greeting_audio: Option<PathBuf>,

    /// Status shown when listening first begins
    pub greeting_copy: String,

    /// Instructional preamble for the reply generator
    pub system_prompt: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::direct()
    }
}

impl SessionConfig {
    /// Direct-start variant: listening begins immediately.
    pub fn direct() -> Self {
        Self {
            volume_threshold: 0.02,
            silence_hangover_ms: 2000,
            sample_interval_ms: 100,
            frame_size: 256,
            sample_rate: 16000,
            min_utterance_bytes: 1000,
            min_transcript_chars: 3,
            failure_backoff_ms: 2000,
            auto_start: true,
            greeting_audio: None,
            greeting_copy: DIRECT_GREETING.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Landing-page variant: more sensitive threshold, waits for an explicit start and
    /// plays a welcome clip before listening.
    pub fn landing() -> Self {
        Self {
            volume_threshold: 0.01,
            auto_start: false,
            greeting_audio: Some(PathBuf::from("audio/i_am_here.mp3")),
            greeting_copy: LANDING_GREETING.to_string(),
            ..Self::direct()
        }
    }

    /// Load from defaults, an optional TOML file, and `CALM__*` environment overrides.
    ///
    /// The file path comes from `CALM_CONFIG` (default `config/calm.toml`) and is skipped
    /// when missing.
    pub fn load() -> VoiceResult<Self> {
        let config_path =
            std::env::var("CALM_CONFIG").unwrap_or_else(|_| "config/calm.toml".to_string());
        let defaults = Self::direct();
        let builder = config::Config::builder()
            .set_default("volume_threshold", defaults.volume_threshold as f64)?
            .set_default("silence_hangover_ms", defaults.silence_hangover_ms as i64)?
            .set_default("sample_interval_ms", defaults.sample_interval_ms as i64)?
            .set_default("auto_start", defaults.auto_start)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::new(&config_path, config::FileFormat::Toml))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("CALM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = built.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the detector or sampler meaningless.
    pub fn validate(&self) -> VoiceResult<()> {
        if !(self.volume_threshold > 0.0 && self.volume_threshold < 1.0) {
            return Err(VoiceError::Config(format!(
                "volume_threshold must be in (0, 1), got {}",
                self.volume_threshold
            )));
        }
        if self.sample_interval_ms == 0 {
            return Err(VoiceError::Config(
                "sample_interval_ms must be positive".to_string(),
            ));
        }
        if self.silence_hangover_ms < self.sample_interval_ms {
            return Err(VoiceError::Config(format!(
                "silence_hangover_ms ({}) must be at least one sample interval ({})",
                self.silence_hangover_ms, self.sample_interval_ms
            )));
        }
        if self.frame_size == 0 {
            return Err(VoiceError::Config("frame_size must be positive".to_string()));
        }
        if self.sample_rate == 0 {
            return Err(VoiceError::Config("sample_rate must be positive".to_string()));
        }
        Ok(())
    }

    pub fn silence_hangover(&self) -> Duration {
        Duration::from_millis(self.silence_hangover_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_millis(self.failure_backoff_ms)
    }
}

/// How the three external capabilities are provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderMode {
    /// Real Deepgram / Anthropic / ElevenLabs calls.
    Live,
    /// Canned text and no audio. Must be chosen explicitly; never a silent fallback.
    Placeholder,
}

impl std::str::FromStr for ProviderMode {
    type Err = VoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(ProviderMode::Live),
            "placeholder" | "mock" => Ok(ProviderMode::Placeholder),
            other => Err(VoiceError::Config(format!(
                "unknown provider mode '{}' (expected live or placeholder)",
                other
            ))),
        }
    }
}

/// Credentials and request parameters for the provider adapters.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub mode: ProviderMode,
    pub deepgram_api_key: Option<String>,
    pub deepgram_url: String,
    pub stt_model: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_url: String,
    pub reply_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_url: String,
    pub elevenlabs_voice_id: String,
    pub tts_model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            mode: ProviderMode::Live,
            deepgram_api_key: None,
            deepgram_url: "https://api.deepgram.com/v1".to_string(),
            stt_model: "nova-2".to_string(),
            anthropic_api_key: None,
            anthropic_url: "https://api.anthropic.com/v1".to_string(),
            reply_model: "claude-opus-4-20250514".to_string(),
            max_tokens: 200,
            temperature: 0.7,
            elevenlabs_api_key: None,
            elevenlabs_url: "https://api.elevenlabs.io/v1".to_string(),
            elevenlabs_voice_id: "EXAVITQu4vr4xnSDxMaL".to_string(),
            tts_model: "eleven_monolingual_v1".to_string(),
        }
    }
}

impl ProviderConfig {
    /// Build from environment: DEEPGRAM_API_KEY, ANTHROPIC_API_KEY, ELEVENLABS_API_KEY,
    /// ELEVENLABS_VOICE_ID, CALM_REPLY_MODEL, CALM_PROVIDER_MODE.
    pub fn from_env() -> VoiceResult<Self> {
        let defaults = Self::default();
        let mode = match std::env::var("CALM_PROVIDER_MODE") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.mode,
        };
        Ok(Self {
            mode,
            deepgram_api_key: non_empty_var("DEEPGRAM_API_KEY"),
            anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
            elevenlabs_api_key: non_empty_var("ELEVENLABS_API_KEY"),
            elevenlabs_voice_id: non_empty_var("ELEVENLABS_VOICE_ID")
                .unwrap_or(defaults.elevenlabs_voice_id.clone()),
            reply_model: non_empty_var("CALM_REPLY_MODEL").unwrap_or(defaults.reply_model.clone()),
            ..defaults
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
