use crate::services::{ReplyGenerator, TextCorrector, Transcriber};
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub transcriber: Arc<dyn Transcriber>,
    pub generator: Arc<dyn ReplyGenerator>,
    pub corrector: Arc<dyn TextCorrector>,
    /// Target language for transcription requests
    pub language: String,
}

impl AppState {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        generator: Arc<dyn ReplyGenerator>,
        corrector: Arc<dyn TextCorrector>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            transcriber,
            generator,
            corrector,
            language: language.into(),
        }
    }
}
