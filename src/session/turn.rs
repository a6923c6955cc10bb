use crate::audio::RecordedAudio;
use chrono::{DateTime, Utc};

/// One record → transcribe → confirm → generate → speak cycle.
///
/// Exactly one turn is live at a time; starting a new recording replaces it.
/// The id rejects transcription completions that settle after their turn was
/// superseded.
#[derive(Debug, Clone)]
pub struct Turn {
    pub id: u64,
    pub recorded_audio: Option<RecordedAudio>,
    pub transcript: Option<String>,
    pub confirmed: bool,
    pub reply: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            recorded_audio: None,
            transcript: None,
            confirmed: false,
            reply: None,
            started_at: Utc::now(),
        }
    }
}
