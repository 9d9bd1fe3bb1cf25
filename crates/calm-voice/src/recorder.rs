//! Utterance capture between speech-start and speech-end.

use crate::wav;
use chrono::{DateTime, Utc};
use tracing::debug;

/// A finalized utterance: one opaque audio artifact compiled from the captured fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    audio: Vec<u8>,
    fragments: usize,
    sample_rate: u32,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl Utterance {
    /// The compiled artifact (WAV, mono PCM16).
    pub fn audio(&self) -> &[u8] {
        &self.audio
    }

    /// Byte length of the compiled artifact.
    pub fn len(&self) -> usize {
        self.audio.len()
    }

    pub fn is_empty(&self) -> bool {
        self.audio.len() <= wav::WAV_HEADER_LEN
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Below `min_bytes` the utterance is treated as a transient noise burst.
    pub fn is_viable(&self, min_bytes: usize) -> bool {
        self.len() >= min_bytes
    }
}

/// Accumulates PCM16 fragments for the active utterance, in arrival order.
#[derive(Debug)]
pub struct UtteranceRecorder {
    sample_rate: u32,
    fragments: Vec<Vec<u8>>,
    bytes: usize,
    started_at: Option<DateTime<Utc>>,
}

impl UtteranceRecorder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            fragments: Vec::new(),
            bytes: 0,
            started_at: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.started_at.is_some()
    }

    /// Running byte size of the buffered fragments.
    pub fn buffered_bytes(&self) -> usize {
        self.bytes
    }

    /// Begin a new utterance, dropping anything left from a previous one.
    pub fn start(&mut self) {
        self.fragments.clear();
        self.bytes = 0;
        self.started_at = Some(Utc::now());
        debug!("recording started");
    }

    /// Append one fragment. Returns false (and drops it) when no utterance is active.
    pub fn push(&mut self, fragment: Vec<u8>) -> bool {
        if !self.is_recording() || fragment.is_empty() {
            return false;
        }
        self.bytes += fragment.len();
        self.fragments.push(fragment);
        true
    }

    /// Stop recording and compile the fragments. `None` if nothing was being recorded.
    pub fn finish(&mut self) -> Option<Utterance> {
        let started_at = self.started_at.take()?;
        let fragments = self.fragments.len();
        let mut pcm = Vec::with_capacity(self.bytes);
        for fragment in self.fragments.drain(..) {
            pcm.extend_from_slice(&fragment);
        }
        self.bytes = 0;
        let utterance = Utterance {
            audio: wav::wrap_pcm16(&pcm, self.sample_rate),
            fragments,
            sample_rate: self.sample_rate,
            started_at,
            finished_at: Utc::now(),
        };
        debug!(
            bytes = utterance.len(),
            fragments = utterance.fragments,
            "recording finished"
        );
        Some(utterance)
    }

    /// Abandon any in-progress recording. Safe to call when idle.
    pub fn stop(&mut self) {
        if self.started_at.take().is_some() {
            debug!(bytes = self.bytes, "recording abandoned");
        }
        self.fragments.clear();
        self.bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_are_concatenated_in_arrival_order() {
        let mut recorder = UtteranceRecorder::new(16000);
        recorder.start();
        assert!(recorder.push(vec![1, 2]));
        assert!(recorder.push(vec![3]));
        assert!(recorder.push(vec![4, 5, 6]));
        assert_eq!(recorder.buffered_bytes(), 6);

        let utterance = recorder.finish().unwrap();
        assert_eq!(&utterance.audio()[wav::WAV_HEADER_LEN..], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(utterance.len(), wav::WAV_HEADER_LEN + 6);
        assert_eq!(utterance.fragment_count(), 3);
        assert_eq!(utterance.sample_rate(), 16000);
        assert!(!recorder.is_recording());
        assert_eq!(recorder.buffered_bytes(), 0);
    }

    #[test]
    fn fragments_outside_an_utterance_are_dropped() {
        let mut recorder = UtteranceRecorder::new(16000);
        assert!(!recorder.push(vec![0; 500]));
        assert!(recorder.finish().is_none());
    }

    #[test]
    fn viability_uses_compiled_size() {
        let mut recorder = UtteranceRecorder::new(16000);
        recorder.start();
        recorder.push(vec![0; 900]);
        let small = recorder.finish().unwrap();
        assert!(!small.is_viable(1000));

        recorder.start();
        recorder.push(vec![0; 600]);
        recorder.push(vec![0; 600]);
        assert!(recorder.finish().unwrap().is_viable(1000));
    }

    #[test]
    fn start_discards_previous_buffer() {
        let mut recorder = UtteranceRecorder::new(16000);
        recorder.start();
        recorder.push(vec![9; 10]);
        recorder.start();
        recorder.push(vec![1]);
        let utterance = recorder.finish().unwrap();
        assert_eq!(&utterance.audio()[wav::WAV_HEADER_LEN..], &[1]);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut recorder = UtteranceRecorder::new(16000);
        recorder.stop();
        recorder.start();
        recorder.push(vec![1, 2, 3]);
        recorder.stop();
        recorder.stop();
        assert!(!recorder.is_recording());
        assert_eq!(recorder.buffered_bytes(), 0);
        assert!(recorder.finish().is_none());
    }
}
