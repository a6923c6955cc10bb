use super::level::ProficiencyLevel;
use super::screen::Screen;
use super::state::RecordingState;
use serde::Serialize;

/// A transient user-visible message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Distinguishes notices so a delayed auto-clear never removes a newer one
    pub id: u64,
    pub text: String,
}

/// Read-only projection of the session for presentation.
///
/// Published on a watch channel after every transition; presentation
/// consumes this snapshot and never the session internals.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub screen: Screen,
    pub level: Option<ProficiencyLevel>,
    pub recording: RecordingState,
    /// Countdown seconds remaining while recording
    pub seconds_remaining: u32,
    pub transcript: Option<String>,
    pub reply: Option<String>,
    pub speaking: bool,
    pub notice: Option<String>,
}
