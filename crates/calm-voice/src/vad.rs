//! Voice activity detection by loudness threshold and silence hangover.
//!
//! Each sampler tick feeds one RMS value. Loudness above the threshold starts (or
//! keeps alive) an utterance; quiet while speaking arms a hangover deadline, and
//! only sustained quiet until that deadline ends the utterance. Any loud tick
//! cancels the deadline, so brief pauses inside speech never end the turn.

use crate::session::Phase;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Discrete detector output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    SpeechStarted,
    SpeechEnded,
}

/// Detector state.
///
/// `pending_silence_deadline` is set only while `is_speaking` and the most recent
/// sample was below threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct VadState {
    pub is_speaking: bool,
    pub pending_silence_deadline: Option<Instant>,
    pub volume_threshold: f32,
    pub silence_hangover_ms: u64,
}

/// Converts a loudness stream into speech-start / speech-end events.
#[derive(Debug, Clone)]
pub struct VoiceActivityDetector {
    state: VadState,
}

impl VoiceActivityDetector {
    pub fn new(volume_threshold: f32, silence_hangover: Duration) -> Self {
        Self {
            state: VadState {
                is_speaking: false,
                pending_silence_deadline: None,
                volume_threshold,
                silence_hangover_ms: silence_hangover.as_millis() as u64,
            },
        }
    }

    pub fn state(&self) -> &VadState {
        &self.state
    }

    pub fn is_speaking(&self) -> bool {
        self.state.is_speaking
    }

    /// Deadline at which speech-end fires unless a loud tick arrives first.
    pub fn deadline(&self) -> Option<Instant> {
        self.state.pending_silence_deadline
    }

    /// Feed one loudness sample. Inert unless the session is listening or speaking.
    pub fn observe(&mut self, loudness: f32, phase: Phase, now: Instant) -> Option<VadEvent> {
        if !matches!(phase, Phase::Listening | Phase::Speaking) {
            return None;
        }

        if loudness > self.state.volume_threshold {
            if self.state.pending_silence_deadline.take().is_some() {
                debug!(loudness, "speech resumed, hangover cancelled");
            }
            if !self.state.is_speaking && phase == Phase::Listening {
                self.state.is_speaking = true;
                debug!(loudness, "speech started");
                return Some(VadEvent::SpeechStarted);
            }
            return None;
        }

        if !self.state.is_speaking {
            return None;
        }
        if self.state.pending_silence_deadline.is_none() {
            let hangover = Duration::from_millis(self.state.silence_hangover_ms);
            self.state.pending_silence_deadline = Some(now + hangover);
            debug!(
                loudness,
                hangover_ms = self.state.silence_hangover_ms,
                "silence, hangover armed"
            );
        }
        self.expire(now)
    }

    /// Fire speech-end if the hangover deadline has been reached.
    pub fn expire(&mut self, now: Instant) -> Option<VadEvent> {
        match self.state.pending_silence_deadline {
            Some(deadline) if now >= deadline && self.state.is_speaking => {
                self.state.is_speaking = false;
                self.state.pending_silence_deadline = None;
                debug!("silence hangover elapsed, speech ended");
                Some(VadEvent::SpeechEnded)
            }
            _ => None,
        }
    }

    /// Cancel any pending hangover and forget the current utterance.
    pub fn reset(&mut self) {
        self.state.is_speaking = false;
        self.state.pending_silence_deadline = None;
    }
}
