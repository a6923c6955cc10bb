//! Synthesized speech output
//!
//! This module provides:
//! - The `SpeechEngine` trait for speech output devices (voice catalog,
//!   speak, cancel) and a simulated engine for tests and demos
//! - The `PlaybackManager`, which owns the single current utterance and
//!   rejects stale lifecycle events by token comparison
//! - Voice selection and text normalization for slow, clear speech

pub mod engine;
pub mod playback;
pub mod voice;

pub use engine::{
    PlaybackEvent, PlaybackToken, Prosody, SimulatedSpeechEngine, SpeechEngine, SpeechError,
    SpokenRecord, Utterance,
};
pub use playback::{normalize_speech_text, PlaybackManager, PlaybackStatus, SpeechSettings};
pub use voice::{select_voice, Voice};
