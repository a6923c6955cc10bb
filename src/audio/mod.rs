pub mod capture;
pub mod recorder;

pub use capture::{
    AudioChunk, CaptureError, Microphone, MicrophoneAccess, ScriptedMicrophone,
    ScriptedMicrophoneHandle, WavFileMicrophone,
};
pub use recorder::{FragmentBuffer, RecordedAudio};
