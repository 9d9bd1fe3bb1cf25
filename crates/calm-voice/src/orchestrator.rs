//! Conversation Orchestrator - the session driver
//!
//! Owns one `Session` and moves it around the listen → speak → process → respond
//! cycle. Detector ticks and the transcribe → reply → synthesize pipeline run on the
//! same task and never overlap: the detector is suspended for the whole pipeline run,
//! so only one driver mutates the session at a time.

use crate::capability::{AudioResource, ReplyGenerator, SpeechSynthesizer, Transcriber};
use crate::config::SessionConfig;
use crate::conversation::{Conversation, Turn};
use crate::error::{VoiceError, VoiceResult};
use crate::playback::{AudioSink, PlaybackController};
use crate::recorder::Utterance;
use crate::session::{Effect, Phase, Session, SessionEvent, Transition};
use crate::stream::{AudioSource, AudioStream};
use crate::status::StatusSink;
use crate::vad::VadEvent;
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::time::{sleep_until, Instant, MissedTickBehavior};
use std::path::Path;
use tracing::{debug, error, info, warn};

const WELCOME: &str = "Welcome...";
const MIC_NEEDED: &str = "Microphone access needed. Please allow microphone permissions.";
const HEARING: &str = "I'm listening...";
const PROCESSING: &str = "Processing your message...";
const TRANSCRIBING: &str = "Converting your voice to text...";
const THINKING: &str = "Preparing a thoughtful response...";
const VOICING: &str = "Preparing voice response...";
const PLAYING: &str = "Playing response...";
const FAILED: &str = "Sorry, something went wrong. Resuming listening...";
const RESUMED: &str = "Listening... I'm here when you need to talk";
const ENDED: &str = "Session ended.";

/// The three external capabilities a pipeline run calls, in order.
#[derive(Clone)]
pub struct Capabilities {
    pub transcriber: Arc<dyn Transcriber>,
    pub replier: Arc<dyn ReplyGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

/// Why an utterance was dropped without producing a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// Compiled audio below the minimum viable size; no capability was called.
    TooSmall { bytes: usize },
    /// Transcript below the minimum length; reply generation was skipped.
    Noise { transcript: String },
}

/// Result of one pipeline run.
#[derive(Debug)]
pub enum PipelineOutcome {
    Discarded(DiscardReason),
    /// A turn was appended to history. `spoken` is false when synthesis produced no audio.
    Completed { spoken: bool },
    /// Transcription or reply generation failed; history unchanged.
    Failed(VoiceError),
    /// The session was not in `Processing`.
    Skipped,
}

enum Stages {
    Noise(String),
    Reply {
        transcript: String,
        reply: String,
        audio: Option<AudioResource>,
    },
}

/// Start and close signals for a running session. Cheap to clone; any task may use it.
#[derive(Clone)]
pub struct SessionHandle {
    start: Arc<Notify>,
    close: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    /// Begin listening when the session was configured without auto-start.
    pub fn start(&self) {
        self.start.notify_one();
    }

    /// Request close. Idempotent.
    pub fn close(&self) {
        self.close.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.close.borrow()
    }
}

/// The session state machine and pipeline driver.
pub struct ConversationOrchestrator {
    config: SessionConfig,
    session: Session,
    capabilities: Capabilities,
    playback: PlaybackController,
    status: Arc<dyn StatusSink>,
    stream: Option<AudioStream>,
    pending_utterance: Option<Utterance>,
    recovery_due: Option<Instant>,
    handle: SessionHandle,
}

impl ConversationOrchestrator {
    /// Create an idle session
    pub fn new(
        config: SessionConfig,
        capabilities: Capabilities,
        sink: Arc<dyn AudioSink>,
        status: Arc<dyn StatusSink>,
    ) -> VoiceResult<Self> {
        config.validate()?;
        let (close_tx, _) = watch::channel(false);
        Ok(Self {
            session: Session::new(&config),
            config,
            capabilities,
            playback: PlaybackController::new(sink),
            status,
            stream: None,
            pending_utterance: None,
            recovery_due: None,
            handle: SessionHandle {
                start: Arc::new(Notify::new()),
                close: Arc::new(close_tx),
            },
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn history(&self) -> &Conversation {
        self.session.conversation()
    }

    pub fn is_first_turn(&self) -> bool {
        self.session.is_first_turn()
    }

    /// Whether a microphone stream is currently held.
    pub fn holds_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Acquire the microphone and begin listening.
    ///
    /// Acquisition failure is fatal to starting: the user is told permission is needed and
    /// the session stays idle. Calling this on a started session is a no-op.
    pub async fn start(&mut self, source: &dyn AudioSource) -> VoiceResult<()> {
        if self.phase() != Phase::Idle {
            debug!(phase = %self.phase(), "start ignored, session already running");
            return Ok(());
        }
        let stream = match source.acquire().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "🎤 microphone acquisition failed");
                self.status.report_status(MIC_NEEDED, true);
                return Err(e);
            }
        };
        info!(sample_rate = stream.sample_rate(), "🎤 microphone acquired");
        self.stream = Some(stream);
        match self.config.greeting_audio.clone() {
            Some(clip) => {
                self.play_welcome(&clip).await;
                self.dispatch(SessionEvent::GreetingFinished);
            }
            None => {
                self.dispatch(SessionEvent::Started);
            }
        }
        let greeting = self.config.greeting_copy.clone();
        self.status.report_status(&greeting, false);
        Ok(())
    }

    /// Read the analyser once. `None` when no stream is held or the sampler is suspended.
    pub fn sample_level(&mut self) -> Option<f32> {
        if !self.session.sampler().is_active() {
            return None;
        }
        let analyser = self.stream.as_mut()?.analyser_mut()?;
        Some(self.session.sampler_mut().sample(analyser))
    }

    /// Feed one loudness sample. Returns the finalized utterance when speech ended.
    pub fn on_level(&mut self, loudness: f32, now: Instant) -> Option<Utterance> {
        let phase = self.phase();
        match self.session.vad_mut().observe(loudness, phase, now)? {
            VadEvent::SpeechStarted => {
                self.dispatch(SessionEvent::SpeechStarted);
                self.status.report_status(HEARING, false);
                None
            }
            VadEvent::SpeechEnded => self.end_speech(),
        }
    }

    /// Silence hangover timer fired.
    pub fn on_deadline(&mut self, now: Instant) -> Option<Utterance> {
        match self.session.vad_mut().expire(now)? {
            VadEvent::SpeechEnded => self.end_speech(),
            VadEvent::SpeechStarted => None,
        }
    }

    /// Captured audio fragment. Kept only while an utterance is being recorded.
    pub fn on_fragment(&mut self, fragment: Vec<u8>) {
        if !self.session.recorder_mut().push(fragment) {
            debug!("fragment outside an utterance dropped");
        }
    }

    fn end_speech(&mut self) -> Option<Utterance> {
        self.dispatch(SessionEvent::SpeechEnded)?;
        self.status.report_status(PROCESSING, false);
        self.pending_utterance.take()
    }

    /// Run the transcribe → reply → synthesize → play pipeline for a finalized utterance.
    ///
    /// Always leaves the session in `Listening` (or `Idle` if it was closed meanwhile by
    /// dropping this future). A failed run waits out the backoff before resuming.
    pub async fn process_utterance(&mut self, utterance: Utterance) -> PipelineOutcome {
        if self.phase() != Phase::Processing {
            warn!(phase = %self.phase(), "pipeline run requested outside processing");
            return PipelineOutcome::Skipped;
        }

        if !utterance.is_viable(self.config.min_utterance_bytes) {
            info!(bytes = utterance.len(), "recording too short, ignoring");
            self.resume(SessionEvent::UtteranceDiscarded);
            return PipelineOutcome::Discarded(DiscardReason::TooSmall {
                bytes: utterance.len(),
            });
        }

        match self.run_stages(&utterance).await {
            Ok(Stages::Noise(transcript)) => {
                info!(transcript = %transcript, "transcription too short or empty, ignoring");
                self.resume(SessionEvent::UtteranceDiscarded);
                PipelineOutcome::Discarded(DiscardReason::Noise { transcript })
            }
            Ok(Stages::Reply {
                transcript,
                reply,
                audio,
            }) => {
                let spoken = match audio {
                    Some(resource) => {
                        self.dispatch(SessionEvent::ReplyReady);
                        self.status.report_status(PLAYING, false);
                        self.playback.play(&resource).await;
                        true
                    }
                    None => {
                        debug!("no playable reply, skipping playback");
                        false
                    }
                };

                let was_first = self.session.is_first_turn();
                self.session.complete_turn(Turn::new(transcript, reply));
                info!(turns = self.history().len(), spoken, "✅ turn complete");
                if was_first {
                    self.status.reveal_end_session_control();
                }
                self.resume(SessionEvent::TurnCompleted);
                PipelineOutcome::Completed { spoken }
            }
            Err(e) => {
                if e.is_pipeline_abort() {
                    warn!(error = %e, "pipeline run failed");
                } else {
                    error!(error = %e, "pipeline run failed unexpectedly");
                }
                if e.is_user_visible() {
                    self.status.report_status(FAILED, true);
                }
                self.dispatch(SessionEvent::PipelineFailed);
                if let Some(due) = self.recovery_due.take() {
                    sleep_until(due).await;
                }
                self.resume(SessionEvent::RecoveryElapsed);
                PipelineOutcome::Failed(e)
            }
        }
    }

    /// Welcome clip failures are logged and skipped; listening starts either way.
    async fn play_welcome(&mut self, clip: &Path) {
        self.dispatch(SessionEvent::Greeting);
        self.status.report_status(WELCOME, false);
        match AudioResource::from_file(clip).await {
            Ok(resource) => {
                self.playback.play(&resource).await;
            }
            Err(e) => warn!(error = %e, clip = %clip.display(), "welcome clip unavailable"),
        }
    }

    async fn run_stages(&self, utterance: &Utterance) -> VoiceResult<Stages> {
        self.status.report_status(TRANSCRIBING, false);
        let raw = self.capabilities.transcriber.transcribe(utterance).await?;
        let transcript = raw.trim().to_string();
        info!(transcript = %transcript, "📝 transcription");
        self.status.show_transcript(&transcript);
        if transcript.chars().count() < self.config.min_transcript_chars {
            return Ok(Stages::Noise(transcript));
        }

        self.status.report_status(THINKING, false);
        let context = self.session.conversation().context_for(&transcript);
        let reply = self
            .capabilities
            .replier
            .generate_reply(&self.config.system_prompt, &context)
            .await?;
        debug!(reply = %reply, "reply generated");

        self.status.report_status(VOICING, false);
        let audio = match self.capabilities.synthesizer.synthesize(&reply).await {
            Ok(resource) => resource.filter(|r| !r.is_empty()),
            Err(e) => {
                warn!(error = %e, "speech synthesis unavailable, skipping audio");
                None
            }
        };

        Ok(Stages::Reply {
            transcript,
            reply,
            audio,
        })
    }

    fn resume(&mut self, event: SessionEvent) {
        if self.dispatch(event).is_some() {
            self.status.report_status(RESUMED, false);
        }
    }

    /// Release everything and return to `Idle`. Safe to call repeatedly and from any phase.
    pub fn close(&mut self) {
        if self.phase() == Phase::Idle && self.stream.is_none() {
            debug!("close on idle session, nothing to release");
            return;
        }
        self.dispatch(SessionEvent::Closed);
    }

    fn dispatch(&mut self, event: SessionEvent) -> Option<Transition> {
        let Some(t) = self.session.apply(event) else {
            debug!(phase = %self.phase(), ?event, "event ignored");
            return None;
        };
        if t.from != t.to {
            info!(from = %t.from, to = %t.to, "phase transition");
            self.status.set_phase_indicator(t.to);
        }
        for effect in &t.effects {
            self.run_effect(*effect);
        }
        Some(t)
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::StartSampler => {
                self.session.vad_mut().reset();
                self.discard_stale_fragments();
                self.session.sampler_mut().start();
            }
            Effect::SuspendSampler => self.session.sampler_mut().stop(),
            Effect::BeginUtterance => self.session.recorder_mut().start(),
            Effect::FinalizeUtterance => {
                // Fragments delivered before speech-end belong to this utterance.
                if let Some(stream) = self.stream.as_mut() {
                    for fragment in stream.drain_fragments() {
                        self.session.recorder_mut().push(fragment);
                    }
                }
                self.pending_utterance = self.session.recorder_mut().finish();
            }
            Effect::ScheduleRecovery => {
                self.recovery_due = Some(Instant::now() + self.config.failure_backoff());
            }
            Effect::Teardown => self.teardown(),
        }
    }

    fn discard_stale_fragments(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            let stale = stream.drain_fragments().len();
            if stale > 0 {
                debug!(stale, "discarded fragments captured while suspended");
            }
        }
    }

    fn teardown(&mut self) {
        // Order: sampling timer, hangover timer, recorder, microphone, analyser.
        self.session.sampler_mut().stop();
        self.session.vad_mut().reset();
        self.session.recorder_mut().stop();
        if let Some(mut stream) = self.stream.take() {
            stream.release_input();
            stream.release_analyser();
        }
        self.pending_utterance = None;
        self.recovery_due = None;
        self.session.reset();

        self.status.report_status(ENDED, false);
        self.status.hide_transcript();
        self.status.hide_end_session_control();
        info!("🛑 session closed");
    }

    /// Drive the session until closed.
    ///
    /// Waits for `SessionHandle::start` first unless `auto_start` is set. Returns the
    /// acquisition error if the microphone cannot be opened.
    pub async fn run(&mut self, source: &dyn AudioSource) -> VoiceResult<()> {
        let mut close_rx = self.handle.close.subscribe();
        if *close_rx.borrow_and_update() {
            return Ok(());
        }

        if !self.config.auto_start {
            let start = Arc::clone(&self.handle.start);
            tokio::select! {
                _ = start.notified() => {}
                _ = close_rx.changed() => return Ok(()),
            }
        }

        tokio::select! {
            started = self.start(source) => started?,
            _ = close_rx.changed() => {
                self.close();
                return Ok(());
            }
        }

        let mut ticker = tokio::time::interval(self.session.sampler().cadence());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.reset();

        loop {
            if self.phase() == Phase::Idle {
                break;
            }
            let sampling = self.session.sampler().is_active();
            let deadline = self.session.vad().deadline();

            let finished = tokio::select! {
                _ = close_rx.changed() => {
                    self.close();
                    break;
                }
                _ = ticker.tick(), if sampling => {
                    let level = self.sample_level().unwrap_or(0.0);
                    self.on_level(level, Instant::now())
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_deadline(Instant::now())
                }
                fragment = next_fragment(&mut self.stream) => {
                    match fragment {
                        Some(fragment) => self.on_fragment(fragment),
                        None => warn!("microphone stream ended"),
                    }
                    None
                }
            };

            let Some(utterance) = finished else {
                continue;
            };

            let outcome = tokio::select! {
                outcome = self.process_utterance(utterance) => Some(outcome),
                _ = close_rx.changed() => None,
            };
            match outcome {
                Some(outcome) => debug!(?outcome, "pipeline run finished"),
                None => {
                    self.close();
                    break;
                }
            }
            ticker.reset();
        }

        Ok(())
    }
}

async fn next_fragment(stream: &mut Option<AudioStream>) -> Option<Vec<u8>> {
    match stream {
        Some(stream) => stream.next_fragment().await,
        None => std::future::pending().await,
    }
}
