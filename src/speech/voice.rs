use serde::{Deserialize, Serialize};

/// One synthesized-speech voice from the engine's catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Engine-assigned voice name (e.g. "Xander", "Google Nederlands Female")
    pub name: String,
    /// BCP-47 style language tag (e.g. "nl-NL")
    pub language: String,
    /// Whether the engine marks this as a feminine voice
    pub feminine: bool,
}

impl Voice {
    pub fn new(name: impl Into<String>, language: impl Into<String>, feminine: bool) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
            feminine,
        }
    }

    fn matches_language(&self, language: &str) -> bool {
        let prefix = language.split('-').next().unwrap_or(language);
        self.language.starts_with(prefix)
    }
}

/// Pick a voice from the catalog.
///
/// Preference order: locale match with a feminine hint, any locale match,
/// the engine's first voice. Returns `None` only on an empty catalog.
pub fn select_voice(voices: &[Voice], language: &str, prefer_feminine: bool) -> Option<Voice> {
    if prefer_feminine {
        if let Some(voice) = voices
            .iter()
            .find(|v| v.matches_language(language) && v.feminine)
        {
            return Some(voice.clone());
        }
    }

    voices
        .iter()
        .find(|v| v.matches_language(language))
        .or_else(|| voices.first())
        .cloned()
}
