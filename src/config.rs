use crate::session::SessionConfig;
use crate::speech::SpeechSettings;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub recording: RecordingConfig,
    pub speech: SpeechSettings,
    pub openai: OpenAiConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct RecordingConfig {
    /// Recording time limit in seconds
    pub countdown_secs: u32,
    /// MIME type of the capture encoding
    pub mime_type: String,
    /// Target language for transcription
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub chat_model: String,
    pub transcription_model: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Session configuration derived from the loaded file
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            countdown_secs: self.recording.countdown_secs,
            mime_type: self.recording.mime_type.clone(),
            language: self.recording.language.clone(),
            speech: self.speech.clone(),
            ..SessionConfig::default()
        }
    }
}
