//! Display collaborator: status text, transcript, phase indicator, end-session control.
//!
//! All calls are fire-and-forget; the orchestrator never observes a result.

use crate::session::Phase;
use tracing::{error, info};

pub trait StatusSink: Send + Sync {
    fn report_status(&self, message: &str, is_error: bool);

    fn show_transcript(&self, text: &str);

    fn set_phase_indicator(&self, phase: Phase);

    /// Called after the first completed turn.
    fn reveal_end_session_control(&self);

    /// Called on close.
    fn hide_transcript(&self) {}

    /// Called on close.
    fn hide_end_session_control(&self) {}
}

/// Status sink that writes everything to the log.
#[derive(Debug, Default)]
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn report_status(&self, message: &str, is_error: bool) {
        if is_error {
            error!(target: "calm::status", "{}", message);
        } else {
            info!(target: "calm::status", "{}", message);
        }
    }

    fn show_transcript(&self, text: &str) {
        info!(target: "calm::status", "📝 \"{}\"", text);
    }

    fn set_phase_indicator(&self, phase: Phase) {
        info!(target: "calm::status", phase = %phase, "phase changed");
    }

    fn reveal_end_session_control(&self) {
        info!(target: "calm::status", "press Ctrl+C to end the session");
    }
}
