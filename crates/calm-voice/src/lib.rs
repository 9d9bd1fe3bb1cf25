//! # Calm Voice - hands-free voice coaching sessions
//!
//! One session listens to the microphone, decides when the speaker has finished a
//! turn, and sends the captured utterance through transcription, reply generation
//! and speech synthesis before listening again.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                   Conversation Orchestrator                     │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────┐  │
//! │  │   Audio In   │→ │ Volume (RMS) │→ │ Voice Activity Det.  │  │
//! │  │ AudioSource  │  │   100ms tick │  │   (2000ms hangover)  │  │
//! │  └──────────────┘  └──────────────┘  └──────────────────────┘  │
//! │         ↓ fragments                             ↓ speech end   │
//! │  ┌──────────────┐   ┌────────────┐   ┌────────┐   ┌─────────┐  │
//! │  │   Recorder   │ → │ Transcribe │ → │ Reply  │ → │  Speak  │  │
//! │  │    (WAV)     │   │ (Deepgram) │   │(Claude)│   │(Eleven) │  │
//! │  └──────────────┘   └────────────┘   └────────┘   └─────────┘  │
//! │                                                        ↓       │
//! │                                          ┌──────────────────┐  │
//! │                                          │ Audio Out (sink) │  │
//! │                                          └──────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```

pub mod capability;
pub mod config;
pub mod conversation;
#[cfg(feature = "device")]
pub mod device;
pub mod error;
pub mod orchestrator;
pub mod playback;
pub mod providers;
pub mod recorder;
pub mod sampler;
pub mod session;
pub mod status;
pub mod stream;
pub mod vad;
pub mod wav;

pub use capability::{AudioResource, ReplyGenerator, SpeechSynthesizer, Transcriber};
pub use config::{ProviderConfig, ProviderMode, SessionConfig, DEFAULT_SYSTEM_PROMPT};
pub use conversation::{ChatMessage, Conversation, Role, Turn};
#[cfg(feature = "device")]
pub use device::{CpalSource, RodioSink};
pub use error::{VoiceError, VoiceResult};
pub use orchestrator::{
    Capabilities, ConversationOrchestrator, DiscardReason, PipelineOutcome, SessionHandle,
};
pub use playback::{AudioSink, NullSink, PlaybackController, PlaybackEnd};
pub use providers::{build_capabilities, ProviderHealth};
pub use recorder::{Utterance, UtteranceRecorder};
pub use sampler::{rms, VolumeSampler};
pub use session::{transition, Effect, Phase, Session, SessionEvent, Transition};
pub use status::{StatusSink, TracingStatus};
pub use stream::{
    fragment_channel, AudioSource, AudioStream, LevelAnalyser, LevelTap, TapAnalyser,
    FRAGMENT_QUEUE_CAPACITY,
};
pub use vad::{VadEvent, VadState, VoiceActivityDetector};
