//! External service collaborators
//!
//! The conversation core consumes three services, each behind a trait:
//! - `Transcriber`: audio artifact + language → transcript
//! - `ReplyGenerator`: user text + proficiency level → baker reply (or a
//!   scripted greeting)
//! - `TextCorrector`: answer text → correctness verdict
//!
//! Each trait has an OpenAI-compatible HTTP implementation and a scripted
//! in-process implementation for tests and demos.

mod chat;
pub mod correction;
pub mod generation;
pub mod transcription;

pub use correction::{
    parse_verdict, word_count, CorrectionError, CorrectionVerdict, OpenAiTextCorrector,
    ScriptedTextCorrector, TextCorrector, MIN_ANSWER_WORDS,
};
pub use generation::{
    level_system_prompt, scripted_greeting, GenerationError, OpenAiReplyGenerator, ReplyGenerator,
    ReplyRequest, ScriptedReplyGenerator,
};
pub use transcription::{
    OpenAiTranscriber, ScriptedTranscriber, Transcriber, TranscriptionError,
};
