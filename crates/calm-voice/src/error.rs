//! Error types for the Calm voice engine

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur while running a voice session
#[derive(Error, Debug)]
pub enum VoiceError {
    /// Microphone or audio stream unavailable at session start.
    #[error("Audio acquisition error: {0}")]
    Acquisition(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Reply generation error: {0}")]
    Reply(String),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoiceError {
    /// Errors that abort a pipeline run and send the session back to listening after a backoff.
    pub fn is_pipeline_abort(&self) -> bool {
        matches!(
            self,
            VoiceError::Transcription(_) | VoiceError::Reply(_) | VoiceError::Http(_)
        )
    }

    /// Whether this error produces a user-visible status change.
    ///
    /// Synthesis and playback failures are absorbed by the orchestrator.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, VoiceError::Acquisition(_)) || self.is_pipeline_abort()
    }
}

impl From<config::ConfigError> for VoiceError {
    fn from(err: config::ConfigError) -> Self {
        VoiceError::Config(err.to_string())
    }
}

#[cfg(feature = "device")]
impl From<cpal::DevicesError> for VoiceError {
    fn from(err: cpal::DevicesError) -> Self {
        VoiceError::Acquisition(err.to_string())
    }
}

#[cfg(feature = "device")]
impl From<cpal::DefaultStreamConfigError> for VoiceError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        VoiceError::Acquisition(err.to_string())
    }
}

#[cfg(feature = "device")]
impl From<cpal::BuildStreamError> for VoiceError {
    fn from(err: cpal::BuildStreamError) -> Self {
        VoiceError::Acquisition(err.to_string())
    }
}

#[cfg(feature = "device")]
impl From<cpal::PlayStreamError> for VoiceError {
    fn from(err: cpal::PlayStreamError) -> Self {
        VoiceError::Acquisition(err.to_string())
    }
}
