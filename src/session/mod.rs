//! The conversation session controller
//!
//! This module provides the `ConversationSession` abstraction that manages:
//! - The screen state machine (selection, rules, level choice, chat)
//! - Microphone capture with a countdown-limited recording per turn
//! - Transcription, confirmation and reply generation for the live turn
//! - Cancellation of superseded requests and utterances
//! - A read-only snapshot stream for presentation

mod config;
mod error;
mod guard;
mod level;
mod screen;
mod session;
mod state;
mod status;
mod turn;

pub use config::SessionConfig;
pub use error::SessionError;
pub use guard::{CancellationHandle, RequestGuard};
pub use level::ProficiencyLevel;
pub use screen::Screen;
pub use session::ConversationSession;
pub use state::{RecordingState, StopReason};
pub use status::{Notice, SessionSnapshot};
pub use turn::Turn;
