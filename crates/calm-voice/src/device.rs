//! Microphone capture (cpal) and reply playback (rodio).
//!
//! Only built with the `device` feature, which pulls in the platform audio libraries.

use crate::capability::AudioResource;
use crate::error::{VoiceError, VoiceResult};
use crate::playback::AudioSink;
use crate::stream::{fragment_channel, AudioSource, AudioStream, LevelTap, TapAnalyser};
use crate::wav::pcm16_le;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::io::Cursor;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Default input device, mono, at the session sample rate.
#[derive(Debug, Clone)]
pub struct CpalSource {
    pub sample_rate: u32,
    /// Samples kept for level analysis; at least the sampler frame size.
    pub tap_capacity: usize,
}

impl CpalSource {
    pub fn new(sample_rate: u32, tap_capacity: usize) -> Self {
        Self {
            sample_rate,
            tap_capacity,
        }
    }

    pub fn list_input_devices() -> VoiceResult<Vec<String>> {
        let devices = cpal::default_host().input_devices()?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }
}

/// Keeps the capture thread (and its cpal stream) alive. Dropping it stops capture.
struct CaptureGuard {
    stop: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[async_trait]
impl AudioSource for CpalSource {
    async fn acquire(&self) -> VoiceResult<AudioStream> {
        let tap = LevelTap::new(self.tap_capacity);
        let (fragment_tx, fragment_rx) = fragment_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let sample_rate = self.sample_rate;
        let capture_tap = tap.clone();

        // cpal streams are not Send on every platform, so the stream lives on its own thread.
        let thread = std::thread::Builder::new()
            .name("calm-capture".to_string())
            .spawn(move || {
                let stream = match open_input(sample_rate, capture_tap, fragment_tx) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                // Blocks until the guard is dropped.
                let _ = stop_rx.recv();
                drop(stream);
            })?;

        let guard = CaptureGuard {
            stop: Some(stop_tx),
            thread: Some(thread),
        };
        ready_rx
            .await
            .map_err(|_| VoiceError::Acquisition("capture thread exited".to_string()))??;

        Ok(AudioStream::new(
            Box::new(TapAnalyser(tap)),
            fragment_rx,
            Some(Box::new(guard)),
            sample_rate,
        ))
    }
}

fn open_input(
    sample_rate: u32,
    tap: std::sync::Arc<LevelTap>,
    fragments: mpsc::Sender<Vec<u8>>,
) -> VoiceResult<cpal::Stream> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or_else(|| VoiceError::Acquisition("No input device available".to_string()))?;
    info!(
        "📱 Using input device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let default_config = device.default_input_config()?;
    let channels = default_config.channels().max(1);
    let config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let on_error = |err: cpal::StreamError| warn!("Audio stream error: {}", err);

    let stream = match default_config.sample_format() {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = downmix(data, channels);
                deliver(&tap, &fragments, &mono);
            },
            on_error,
            None,
        )?,
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let floats: Vec<f32> = data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                let mono = downmix(&floats, channels);
                deliver(&tap, &fragments, &mono);
            },
            on_error,
            None,
        )?,
        other => {
            return Err(VoiceError::Acquisition(format!(
                "unsupported input sample format {:?}",
                other
            )))
        }
    };
    stream.play()?;
    info!("✅ Audio capture started ({}Hz)", sample_rate);
    Ok(stream)
}

fn downmix(data: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

fn deliver(tap: &LevelTap, fragments: &mpsc::Sender<Vec<u8>>, mono: &[f32]) {
    tap.write(mono);
    // Full while the session is suspended; closed once it releases its input.
    let _ = fragments.try_send(pcm16_le(mono));
}

/// Plays replies on the default output device.
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioSink;

#[async_trait]
impl AudioSink for RodioSink {
    async fn play(&self, resource: &AudioResource) -> VoiceResult<()> {
        let bytes = resource.bytes.clone();
        tokio::task::spawn_blocking(move || play_blocking(bytes))
            .await
            .map_err(|e| VoiceError::Playback(e.to_string()))?
    }
}

fn play_blocking(bytes: Vec<u8>) -> VoiceResult<()> {
    let (_stream, handle) =
        rodio::OutputStream::try_default().map_err(|e| VoiceError::Playback(e.to_string()))?;
    let sink = rodio::Sink::try_new(&handle).map_err(|e| VoiceError::Playback(e.to_string()))?;
    let source =
        rodio::Decoder::new(Cursor::new(bytes)).map_err(|e| VoiceError::Playback(e.to_string()))?;
    sink.append(source);
    sink.sleep_until_end();
    Ok(())
}
