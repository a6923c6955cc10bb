use serde::Serialize;

/// Recording state of the live turn.
///
/// Exactly one instance per session; transitions drive which affordances
/// are available (microphone button, confirmation button).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordingState {
    /// Not recording, ready to start
    Idle,
    /// Actively capturing microphone audio
    Recording,
    /// Capture stopped, transcription in flight
    Processing,
    /// Transcript shown, waiting for the user to confirm or re-record
    AwaitingConfirmation,
    /// Confirmed text sent to the response generator
    Submitted,
}

impl Default for RecordingState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Why a recording stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The user pressed stop
    Manual,
    /// The countdown reached zero
    Timeout,
}
