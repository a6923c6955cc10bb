use super::screen::Screen;
use super::state::RecordingState;
use thiserror::Error;

/// Session-level failures.
///
/// Every variant recovers at the boundary where it occurs: it becomes a
/// transient user-visible notice (`user_message`) or stays silent. Nothing
/// here is fatal to the session.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Voice input attempted before a proficiency level was chosen
    #[error("no proficiency level selected")]
    LevelNotSelected,

    #[error("microphone access denied: {0}")]
    DeviceAccessDenied(String),

    #[error("microphone unavailable: {0}")]
    DeviceUnavailable(String),

    /// Stop produced an empty fragment buffer; no network call is made
    #[error("recording produced no audio")]
    NoAudioCaptured,

    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    /// Typed or voice submission with blank text
    #[error("input text is empty")]
    EmptyInput,

    #[error("reply generation failed")]
    GenerationFailed,

    #[error("speech playback failed: {0}")]
    PlaybackFailed(String),

    /// The operation is not reachable from the current screen/state
    #[error("operation not available (screen {screen:?}, recording {state:?})")]
    NotAvailable {
        screen: Screen,
        state: RecordingState,
    },
}

impl SessionError {
    /// The user-facing message for this failure, or `None` when it stays
    /// silent.
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::LevelNotSelected => {
                Some("Kies eerst een niveau voordat u begint met spreken.".to_string())
            }
            Self::DeviceAccessDenied(_) => {
                Some("Geen toegang tot de microfoon. Controleer uw instellingen.".to_string())
            }
            Self::DeviceUnavailable(_) => {
                Some("De microfoon is niet beschikbaar. Probeer het opnieuw.".to_string())
            }
            Self::NoAudioCaptured => Some("Geen audio opgenomen. Probeer opnieuw.".to_string()),
            Self::TranscriptionFailed(message) => {
                if message.is_empty() {
                    Some(
                        "Er is een fout opgetreden bij het verwerken van de spraak".to_string(),
                    )
                } else {
                    Some(message.clone())
                }
            }
            Self::EmptyInput => Some("Voer alstublieft een tekst in".to_string()),
            Self::GenerationFailed => {
                Some("Er is een fout opgetreden. Probeer het later opnieuw.".to_string())
            }
            Self::PlaybackFailed(_) => {
                Some("Er is een fout opgetreden bij het afspelen van de spraak".to_string())
            }
            Self::NotAvailable { .. } => None,
        }
    }
}
