use serde::Serialize;

/// Top-level navigation state.
///
/// `Selection` is the entry screen; `DetailedRules` is informational;
/// `LevelSelection` gates the proficiency level; `Chat` is the conversation
/// itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Screen {
    Selection,
    DetailedRules,
    LevelSelection,
    Chat,
}

impl Default for Screen {
    fn default() -> Self {
        Self::Selection
    }
}
