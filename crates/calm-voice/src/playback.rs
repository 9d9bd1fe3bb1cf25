//! Reply playback.
//!
//! `PlaybackController::play` resolves exactly once per resource: when the sink finishes
//! or when it errors. Errors are logged and treated as completion so a session can
//! never get stuck in `Responding`.

use crate::capability::AudioResource;
use crate::error::VoiceResult;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Output device that plays a resource to completion.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, resource: &AudioResource) -> VoiceResult<()>;
}

/// Sink that discards audio. Useful for headless sessions.
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn play(&self, _resource: &AudioResource) -> VoiceResult<()> {
        Ok(())
    }
}

/// How a playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    Finished,
    /// The sink failed; swallowed.
    Errored,
}

pub struct PlaybackController {
    sink: Arc<dyn AudioSink>,
}

impl PlaybackController {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self { sink }
    }

    /// Play once, never retrying.
    pub async fn play(&self, resource: &AudioResource) -> PlaybackEnd {
        info!(bytes = resource.len(), content_type = %resource.content_type, "🔊 playing reply");
        match self.sink.play(resource).await {
            Ok(()) => PlaybackEnd::Finished,
            Err(e) => {
                warn!(error = %e, "playback failed, treating as finished");
                PlaybackEnd::Errored
            }
        }
    }
}
