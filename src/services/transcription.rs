use crate::audio::RecordedAudio;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

/// Errors from the transcription service
#[derive(Debug, Clone, Error)]
pub enum TranscriptionError {
    /// The service rejected or failed the request; the message may be shown
    /// to the user.
    #[error("transcription service error: {0}")]
    Service(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid transcription response: {0}")]
    InvalidResponse(String),
}

/// Transcription service interface
///
/// Input is one assembled audio artifact plus the target language. An empty
/// artifact is rejected by the caller before invocation. An empty transcript
/// is a valid result: nothing was understood.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: &RecordedAudio,
        language: &str,
    ) -> Result<String, TranscriptionError>;
}

/// Whisper-style transcription over an OpenAI-compatible endpoint
pub struct OpenAiTranscriber {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiTranscriber {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(
        &self,
        audio: &RecordedAudio,
        language: &str,
    ) -> Result<String, TranscriptionError> {
        let url = format!(
            "{}/audio/transcriptions",
            self.api_base.trim_end_matches('/')
        );

        let file = reqwest::multipart::Part::bytes(audio.bytes.clone())
            .file_name("opname.webm")
            .mime_str(&audio.mime_type)
            .map_err(|e| TranscriptionError::Service(format!("bad mime type: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("language", language.to_string())
            .text("response_format", "text");

        info!(
            "transcribing {} bytes of {} audio",
            audio.len(),
            audio.mime_type
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Service(format!(
                "status {status}: {body}"
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

        Ok(text.trim().to_string())
    }
}

/// In-process transcriber for tests and demos: returns scripted results and
/// records every invocation.
#[derive(Default)]
pub struct ScriptedTranscriber {
    script: Mutex<VecDeque<Result<String, TranscriptionError>>>,
    received: Mutex<Vec<(RecordedAudio, String)>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful transcript
    pub fn transcript(self, text: impl Into<String>) -> Self {
        if let Ok(mut script) = self.script.try_lock() {
            script.push_back(Ok(text.into()));
        }
        self
    }

    /// Queue a failure
    pub fn failure(self, error: TranscriptionError) -> Self {
        if let Ok(mut script) = self.script.try_lock() {
            script.push_back(Err(error));
        }
        self
    }

    /// Number of transcription requests made
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every (audio, language) pair received, in order
    pub async fn received(&self) -> Vec<(RecordedAudio, String)> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(
        &self,
        audio: &RecordedAudio,
        language: &str,
    ) -> Result<String, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received
            .lock()
            .await
            .push((audio.clone(), language.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(TranscriptionError::Service("script exhausted".to_string())))
    }
}
