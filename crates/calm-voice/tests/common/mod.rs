//! Test doubles shared by the session tests.

#![allow(dead_code)]

use async_trait::async_trait;
use calm_voice::{
    fragment_channel, AudioResource, AudioSink, AudioSource, AudioStream, Capabilities,
    ChatMessage, ConversationOrchestrator, LevelAnalyser, Phase, ReplyGenerator, SessionConfig,
    SpeechSynthesizer, StatusSink, Transcriber, Utterance, VoiceError, VoiceResult,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub const RESUMED: &str = "Listening... I'm here when you need to talk";
pub const MIC_NEEDED: &str = "Microphone access needed. Please allow microphone permissions.";
pub const FAILED: &str = "Sorry, something went wrong. Resuming listening...";
pub const ENDED: &str = "Session ended.";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub struct FakeTranscriber {
    pub result: Mutex<Result<String, String>>,
    /// Wraps the scripted error message; `VoiceError::Transcription` unless replaced.
    pub error_kind: Mutex<fn(String) -> VoiceError>,
    pub calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn returning(text: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Ok(text.to_string())),
            error_kind: Mutex::new(VoiceError::Transcription),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _utterance: &Utterance) -> VoiceResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let wrap = *self.error_kind.lock().unwrap();
        self.result.lock().unwrap().clone().map_err(wrap)
    }
}

pub struct FakeReplier {
    pub result: Mutex<Result<String, String>>,
    pub calls: AtomicUsize,
    pub last_context: Mutex<Vec<ChatMessage>>,
    pub last_system_prompt: Mutex<String>,
}

impl FakeReplier {
    pub fn returning(text: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Ok(text.to_string())),
            calls: AtomicUsize::new(0),
            last_context: Mutex::new(Vec::new()),
            last_system_prompt: Mutex::new(String::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        let replier = Self::returning("");
        *replier.result.lock().unwrap() = Err(message.to_string());
        replier
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReplyGenerator for FakeReplier {
    async fn generate_reply(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
    ) -> VoiceResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_context.lock().unwrap() = messages.to_vec();
        *self.last_system_prompt.lock().unwrap() = system_prompt.to_string();
        self.result.lock().unwrap().clone().map_err(VoiceError::Reply)
    }
}

pub enum SynthBehaviour {
    Audio(Vec<u8>),
    Unavailable,
    Fail,
}

pub struct FakeSynthesizer {
    pub behaviour: SynthBehaviour,
    pub calls: AtomicUsize,
}

impl FakeSynthesizer {
    pub fn new(behaviour: SynthBehaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, _text: &str) -> VoiceResult<Option<AudioResource>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            SynthBehaviour::Audio(bytes) => {
                Ok(Some(AudioResource::new(bytes.clone(), "audio/mpeg")))
            }
            SynthBehaviour::Unavailable => Ok(None),
            SynthBehaviour::Fail => Err(VoiceError::Synthesis("voice service down".to_string())),
        }
    }
}

pub struct CountingSink {
    pub plays: AtomicUsize,
    pub fail: bool,
}

impl CountingSink {
    pub fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            plays: AtomicUsize::new(0),
            fail,
        })
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSink for CountingSink {
    async fn play(&self, _resource: &AudioResource) -> VoiceResult<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(VoiceError::Playback("cannot decode".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingStatus {
    pub statuses: Mutex<Vec<(String, bool)>>,
    pub transcripts: Mutex<Vec<String>>,
    pub phases: Mutex<Vec<Phase>>,
    pub reveals: AtomicUsize,
    pub hides: AtomicUsize,
}

impl RecordingStatus {
    pub fn saw(&self, message: &str) -> bool {
        self.statuses.lock().unwrap().iter().any(|(m, _)| m == message)
    }

    pub fn count(&self, message: &str) -> usize {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == message)
            .count()
    }

    pub fn last(&self) -> Option<(String, bool)> {
        self.statuses.lock().unwrap().last().cloned()
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.phases.lock().unwrap().clone()
    }

    pub fn reveals(&self) -> usize {
        self.reveals.load(Ordering::SeqCst)
    }
}

impl StatusSink for RecordingStatus {
    fn report_status(&self, message: &str, is_error: bool) {
        self.statuses
            .lock()
            .unwrap()
            .push((message.to_string(), is_error));
    }

    fn show_transcript(&self, text: &str) {
        self.transcripts.lock().unwrap().push(text.to_string());
    }

    fn set_phase_indicator(&self, phase: Phase) {
        self.phases.lock().unwrap().push(phase);
    }

    fn reveal_end_session_control(&self) {
        self.reveals.fetch_add(1, Ordering::SeqCst);
    }

    fn hide_end_session_control(&self) {
        self.hides.fetch_add(1, Ordering::SeqCst);
    }
}

/// Analyser that plays back a loudness script, one entry per read, then silence.
/// Every read also emits one captured fragment, the way a live microphone would.
struct ScriptedAnalyser {
    levels: VecDeque<f32>,
    fragment_bytes: usize,
    fragments: mpsc::Sender<Vec<u8>>,
}

impl LevelAnalyser for ScriptedAnalyser {
    fn read_frame(&mut self, frame: &mut [f32]) -> usize {
        let level = self.levels.pop_front().unwrap_or(0.0);
        frame.iter_mut().for_each(|s| *s = level);
        let _ = self.fragments.try_send(vec![0u8; self.fragment_bytes]);
        frame.len()
    }
}

pub struct ScriptedSource {
    pub levels: Vec<f32>,
    pub fragment_bytes: usize,
    pub acquisitions: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(levels: Vec<f32>) -> Self {
        Self {
            levels,
            fragment_bytes: 400,
            acquisitions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSource for ScriptedSource {
    async fn acquire(&self) -> VoiceResult<AudioStream> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = fragment_channel();
        let analyser = ScriptedAnalyser {
            levels: self.levels.iter().copied().collect(),
            fragment_bytes: self.fragment_bytes,
            fragments: tx,
        };
        Ok(AudioStream::new(Box::new(analyser), rx, None, 16000))
    }
}

pub struct DeniedSource;

#[async_trait]
impl AudioSource for DeniedSource {
    async fn acquire(&self) -> VoiceResult<AudioStream> {
        Err(VoiceError::Acquisition("permission denied".to_string()))
    }
}

pub struct Harness {
    pub orchestrator: ConversationOrchestrator,
    pub transcriber: Arc<FakeTranscriber>,
    pub replier: Arc<FakeReplier>,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub sink: Arc<CountingSink>,
    pub status: Arc<RecordingStatus>,
}

pub struct HarnessBuilder {
    pub config: SessionConfig,
    pub transcript: String,
    pub replier: Option<Arc<FakeReplier>>,
    pub synth: SynthBehaviour,
    pub sink_fails: bool,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            config: SessionConfig::default(),
            transcript: "I yelled at my son again".to_string(),
            replier: None,
            synth: SynthBehaviour::Audio(vec![0xFF; 64]),
            sink_fails: false,
        }
    }
}

impl HarnessBuilder {
    pub fn build(self) -> Harness {
        init_tracing();
        let transcriber = FakeTranscriber::returning(&self.transcript);
        let replier = self
            .replier
            .unwrap_or_else(|| FakeReplier::returning("That sounds hard. Let's breathe."));
        let synthesizer = FakeSynthesizer::new(self.synth);
        let sink = CountingSink::new(self.sink_fails);
        let status = Arc::new(RecordingStatus::default());
        let capabilities = Capabilities {
            transcriber: transcriber.clone(),
            replier: replier.clone(),
            synthesizer: synthesizer.clone(),
        };
        let orchestrator =
            ConversationOrchestrator::new(self.config, capabilities, sink.clone(), status.clone())
                .expect("valid config");
        Harness {
            orchestrator,
            transcriber,
            replier,
            synthesizer,
            sink,
            status,
        }
    }
}

pub fn harness() -> Harness {
    HarnessBuilder::default().build()
}

/// Drive the detector through one utterance of `bytes` captured audio and return it.
pub fn speak(orchestrator: &mut ConversationOrchestrator, bytes: usize) -> Utterance {
    let t0 = tokio::time::Instant::now();
    assert!(orchestrator.on_level(0.5, t0).is_none());
    assert_eq!(orchestrator.phase(), Phase::Speaking);
    orchestrator.on_fragment(vec![1u8; bytes]);
    let quiet = t0 + std::time::Duration::from_millis(100);
    assert!(orchestrator.on_level(0.0, quiet).is_none());
    let utterance = orchestrator
        .on_deadline(quiet + orchestrator.config().silence_hangover())
        .expect("speech should end after the hangover");
    assert_eq!(orchestrator.phase(), Phase::Processing);
    utterance
}
