//! Live audio stream handed to a session once microphone acquisition succeeds.
//!
//! A stream has two faces: an analyser that exposes the most recent time-domain
//! frame for loudness sampling, and a fragment feed carrying opaque captured audio
//! for the utterance recorder. Releasing the stream drops the device handle.

use crate::error::VoiceResult;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

/// Captured fragments buffered between the capture side and the session.
///
/// While the detector is suspended nothing drains the queue; once it is full the
/// capture side drops new fragments, which would be discarded on resume anyway.
pub const FRAGMENT_QUEUE_CAPACITY: usize = 256;

/// Bounded channel for captured audio fragments. Senders should use `try_send`.
pub fn fragment_channel() -> (mpsc::Sender<Vec<u8>>, mpsc::Receiver<Vec<u8>>) {
    mpsc::channel(FRAGMENT_QUEUE_CAPACITY)
}

/// Read access to the latest time-domain audio frame.
pub trait LevelAnalyser: Send + Sync {
    /// Copy the most recent samples (normalized to -1.0..1.0) into `frame`.
    /// Returns how many samples were written.
    fn read_frame(&mut self, frame: &mut [f32]) -> usize;
}

/// Acquires the microphone. Fails with `VoiceError::Acquisition` when no stream is available.
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn acquire(&self) -> VoiceResult<AudioStream>;
}

/// Shared ring of the most recent samples, written by the capture callback.
#[derive(Debug)]
pub struct LevelTap {
    capacity: usize,
    samples: Mutex<Vec<f32>>,
}

impl LevelTap {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            samples: Mutex::new(Vec::with_capacity(capacity)),
        })
    }

    /// Append captured samples, keeping only the newest `capacity`.
    pub fn write(&self, data: &[f32]) {
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        if data.len() >= self.capacity {
            samples.clear();
            samples.extend_from_slice(&data[data.len() - self.capacity..]);
            return;
        }
        samples.extend_from_slice(data);
        let overflow = samples.len().saturating_sub(self.capacity);
        if overflow > 0 {
            samples.drain(..overflow);
        }
    }
}

/// Analyser view over a shared `LevelTap`.
pub struct TapAnalyser(pub Arc<LevelTap>);

impl LevelAnalyser for TapAnalyser {
    fn read_frame(&mut self, frame: &mut [f32]) -> usize {
        let samples = self.0.samples.lock().unwrap_or_else(|e| e.into_inner());
        let n = samples.len().min(frame.len());
        frame[..n].copy_from_slice(&samples[samples.len() - n..]);
        n
    }
}

/// An acquired microphone stream.
pub struct AudioStream {
    analyser: Option<Box<dyn LevelAnalyser>>,
    fragments: Option<mpsc::Receiver<Vec<u8>>>,
    device: Option<Box<dyn Send + Sync>>,
    sample_rate: u32,
}

impl AudioStream {
    /// `device` is kept alive until the input is released; dropping it must stop capture.
    pub fn new(
        analyser: Box<dyn LevelAnalyser>,
        fragments: mpsc::Receiver<Vec<u8>>,
        device: Option<Box<dyn Send + Sync>>,
        sample_rate: u32,
    ) -> Self {
        Self {
            analyser: Some(analyser),
            fragments: Some(fragments),
            device,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn analyser_mut(&mut self) -> Option<&mut (dyn LevelAnalyser + 'static)> {
        self.analyser.as_deref_mut()
    }

    /// Wait for the next captured fragment. Pending forever once the input is released or
    /// the capture side has gone away, so it can sit in a `select!` alongside other branches.
    pub async fn next_fragment(&mut self) -> Option<Vec<u8>> {
        let rx = match self.fragments.as_mut() {
            Some(rx) => rx,
            None => return std::future::pending().await,
        };
        let fragment = rx.recv().await;
        if fragment.is_none() {
            self.fragments = None;
        }
        fragment
    }

    /// Fragments already delivered but not yet consumed.
    pub fn drain_fragments(&mut self) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        if let Some(rx) = self.fragments.as_mut() {
            while let Ok(fragment) = rx.try_recv() {
                out.push(fragment);
            }
        }
        out
    }

    /// Stop the microphone. Safe to call repeatedly.
    pub fn release_input(&mut self) {
        if let Some(mut rx) = self.fragments.take() {
            rx.close();
        }
        if self.device.take().is_some() {
            debug!("microphone stream released");
        }
    }

    /// Drop the analysis resource. Safe to call repeatedly.
    pub fn release_analyser(&mut self) {
        if self.analyser.take().is_some() {
            debug!("audio analyser released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.fragments.is_none() && self.device.is_none() && self.analyser.is_none()
    }
}
