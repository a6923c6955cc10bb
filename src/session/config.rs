use crate::speech::SpeechSettings;
use serde::{Deserialize, Serialize};

/// Configuration for a conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier
    pub session_id: String,

    /// Recording time limit in seconds; reaching zero forces a stop.
    /// Earlier builds shipped with 5, current ones with 20.
    pub countdown_secs: u32,

    /// MIME type of the capture encoding
    pub mime_type: String,

    /// Target language passed to the transcription service
    pub language: String,

    /// Playback locale, prosody and voice preference
    pub speech: SpeechSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("gesprek-{}", uuid::Uuid::new_v4()),
            countdown_secs: 20,
            mime_type: "audio/webm;codecs=opus".to_string(),
            language: "nl".to_string(),
            speech: SpeechSettings::default(),
        }
    }
}
