//! Session state machine.
//!
//! `transition` is a pure function of `(Phase, SessionEvent)`: it names the next phase
//! and the effects the orchestrator must carry out. Events that make no sense in the
//! current phase are ignored (`None`), which keeps stray timer or media callbacks from
//! disturbing a session that has already moved on.

use crate::config::SessionConfig;
use crate::conversation::{Conversation, Turn};
use crate::recorder::UtteranceRecorder;
use crate::sampler::VolumeSampler;
use crate::vad::VoiceActivityDetector;
use serde::Serialize;

/// Where the session is in the listen / speak / process / respond cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Listening,
    Speaking,
    Processing,
    Responding,
}

impl Phase {
    /// Whether the detector consumes sampler ticks in this phase.
    pub fn detector_active(self) -> bool {
        matches!(self, Phase::Listening | Phase::Speaking)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Listening => "listening",
            Phase::Speaking => "speaking",
            Phase::Processing => "processing",
            Phase::Responding => "responding",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Audio stream acquired.
    Started,
    /// Audio stream acquired and a welcome clip is about to play.
    Greeting,
    /// Welcome clip finished or failed.
    GreetingFinished,
    SpeechStarted,
    SpeechEnded,
    /// Utterance too small or transcript too short.
    UtteranceDiscarded,
    /// Pipeline produced a playable reply.
    ReplyReady,
    /// Pipeline finished; playback completed or there was nothing to play.
    TurnCompleted,
    /// A pipeline stage failed; listening resumes after the backoff.
    PipelineFailed,
    RecoveryElapsed,
    Closed,
}

/// Side effects requested by a transition, executed in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    StartSampler,
    SuspendSampler,
    BeginUtterance,
    FinalizeUtterance,
    ScheduleRecovery,
    Teardown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    pub effects: Vec<Effect>,
}

/// Pure transition function.
pub fn transition(phase: Phase, event: SessionEvent) -> Option<Transition> {
    use Effect::*;
    use SessionEvent as E;

    let (to, effects) = match (phase, event) {
        (_, E::Closed) => (Phase::Idle, vec![Teardown]),
        (Phase::Idle, E::Started) => (Phase::Listening, vec![StartSampler]),
        (Phase::Idle, E::Greeting) => (Phase::Responding, vec![]),
        (Phase::Responding, E::GreetingFinished) => (Phase::Listening, vec![StartSampler]),
        (Phase::Listening, E::SpeechStarted) => (Phase::Speaking, vec![BeginUtterance]),
        (Phase::Speaking, E::SpeechEnded) => {
            (Phase::Processing, vec![SuspendSampler, FinalizeUtterance])
        }
        (Phase::Processing, E::UtteranceDiscarded) => (Phase::Listening, vec![StartSampler]),
        (Phase::Processing, E::ReplyReady) => (Phase::Responding, vec![]),
        (Phase::Processing, E::PipelineFailed) => (Phase::Processing, vec![ScheduleRecovery]),
        (Phase::Processing, E::RecoveryElapsed) => (Phase::Listening, vec![StartSampler]),
        (Phase::Processing | Phase::Responding, E::TurnCompleted) => {
            (Phase::Listening, vec![StartSampler])
        }
        _ => return None,
    };

    Some(Transition {
        from: phase,
        to,
        effects,
    })
}

/// One conversation: current phase, history, and the capture state it owns.
#[derive(Debug)]
pub struct Session {
    phase: Phase,
    conversation: Conversation,
    is_first_turn: bool,
    vad: VoiceActivityDetector,
    recorder: UtteranceRecorder,
    sampler: VolumeSampler,
}

impl Session {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            phase: Phase::Idle,
            conversation: Conversation::new(),
            is_first_turn: true,
            vad: VoiceActivityDetector::new(config.volume_threshold, config.silence_hangover()),
            recorder: UtteranceRecorder::new(config.sample_rate),
            sampler: VolumeSampler::new(config.frame_size, config.sample_interval()),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Apply `event`, updating the phase. Returns the transition taken, if any.
    pub fn apply(&mut self, event: SessionEvent) -> Option<Transition> {
        let t = transition(self.phase, event)?;
        self.phase = t.to;
        Some(t)
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_first_turn(&self) -> bool {
        self.is_first_turn
    }

    /// Record a successful pipeline run.
    pub fn complete_turn(&mut self, turn: Turn) {
        self.conversation.record(turn);
        self.is_first_turn = false;
    }

    /// Forget history and capture state, as on explicit close.
    pub fn reset(&mut self) {
        self.conversation.clear();
        self.is_first_turn = true;
        self.vad.reset();
        self.recorder.stop();
        self.sampler.stop();
    }

    pub fn vad(&self) -> &VoiceActivityDetector {
        &self.vad
    }

    pub fn vad_mut(&mut self) -> &mut VoiceActivityDetector {
        &mut self.vad
    }

    pub fn recorder(&self) -> &UtteranceRecorder {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut UtteranceRecorder {
        &mut self.recorder
    }

    pub fn sampler(&self) -> &VolumeSampler {
        &self.sampler
    }

    pub fn sampler_mut(&mut self) -> &mut VolumeSampler {
        &mut self.sampler
    }
}
