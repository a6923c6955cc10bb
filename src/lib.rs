pub mod audio;
pub mod config;
pub mod http;
pub mod services;
pub mod session;
pub mod speech;

pub use audio::{
    AudioChunk, CaptureError, FragmentBuffer, Microphone, RecordedAudio, ScriptedMicrophone,
    WavFileMicrophone,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use services::{
    CorrectionVerdict, ReplyGenerator, ReplyRequest, TextCorrector, Transcriber,
};
pub use session::{
    ConversationSession, ProficiencyLevel, RecordingState, Screen, SessionConfig, SessionError,
    SessionSnapshot,
};
pub use speech::{PlaybackManager, SimulatedSpeechEngine, SpeechEngine, SpeechSettings, Voice};
