use super::chat::{chat_completion, ChatCallError, ChatCompletionRequest, ChatMessage};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

/// Answers shorter than this are a user error, checked before any request.
pub const MIN_ANSWER_WORDS: usize = 5;

const CORRECTION_PROMPT: &str = "Je bent een Nederlandse taalexpert die helpt bij het verbeteren \
van de grammatica en zinsstructuur voor mensen die Nederlands leren als onderdeel van hun \
inburgering.

Als de tekst grammaticaal correct is, antwoord dan met: \"CORRECT: \" gevolgd door de \
oorspronkelijke tekst.

Als de tekst grammaticaal niet correct is, verbeter dan de zinsbouw, woordvolgorde en grammatica, \
en antwoord met: \"VERBETERD: \" gevolgd door de verbeterde tekst.

Geef geen andere uitleg. Alleen de prefix (CORRECT of VERBETERD) en de tekst.";

/// Errors from the text correction service
#[derive(Debug, Clone, Error)]
pub enum CorrectionError {
    /// Input shorter than [`MIN_ANSWER_WORDS`]; rejected before any request
    #[error("answer must contain at least {MIN_ANSWER_WORDS} words")]
    TooFewWords,

    #[error("correction service error: {0}")]
    Service(String),

    #[error("network error: {0}")]
    Network(String),
}

/// Verdict on a submitted answer: either a pass-through "correct" or the
/// corrected text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectionVerdict {
    pub corrected_text: String,
    pub is_correct: bool,
}

/// Text correction service interface (separate, simpler flow than the
/// conversation pipeline)
#[async_trait]
pub trait TextCorrector: Send + Sync {
    async fn correct(&self, text: &str) -> Result<CorrectionVerdict, CorrectionError>;
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Parse the CORRECT:/VERBETERD: protocol, falling back to a case-insensitive
/// comparison when the model ignores the format.
pub fn parse_verdict(original: &str, response: &str) -> CorrectionVerdict {
    let response = response.trim();

    if let Some(_rest) = response.strip_prefix("CORRECT:") {
        return CorrectionVerdict {
            corrected_text: original.to_string(),
            is_correct: true,
        };
    }

    if let Some(rest) = response.strip_prefix("VERBETERD:") {
        return CorrectionVerdict {
            corrected_text: rest.trim().to_string(),
            is_correct: false,
        };
    }

    CorrectionVerdict {
        corrected_text: response.to_string(),
        is_correct: response.trim().to_lowercase() == original.trim().to_lowercase(),
    }
}

/// Grammar correction over an OpenAI-compatible chat completion endpoint
pub struct OpenAiTextCorrector {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiTextCorrector {
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
impl TextCorrector for OpenAiTextCorrector {
    async fn correct(&self, text: &str) -> Result<CorrectionVerdict, CorrectionError> {
        if word_count(text) < MIN_ANSWER_WORDS {
            return Err(CorrectionError::TooFewWords);
        }

        let chat_request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(CORRECTION_PROMPT),
                ChatMessage::user(text),
            ],
            max_tokens: 150,
            temperature: 0.3,
        };

        info!("requesting correction for {} words", word_count(text));

        let response =
            chat_completion(&self.client, &self.api_base, &self.api_key, &chat_request)
                .await
                .map_err(|e| match e {
                    ChatCallError::Network(m) => CorrectionError::Network(m),
                    ChatCallError::Service(m) | ChatCallError::InvalidResponse(m) => {
                        CorrectionError::Service(m)
                    }
                })?;

        Ok(parse_verdict(text, &response))
    }
}

/// In-process corrector for tests and demos
#[derive(Default)]
pub struct ScriptedTextCorrector {
    script: Mutex<VecDeque<Result<CorrectionVerdict, CorrectionError>>>,
}

impl ScriptedTextCorrector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verdict(self, verdict: CorrectionVerdict) -> Self {
        if let Ok(mut script) = self.script.try_lock() {
            script.push_back(Ok(verdict));
        }
        self
    }

    pub fn failure(self, error: CorrectionError) -> Self {
        if let Ok(mut script) = self.script.try_lock() {
            script.push_back(Err(error));
        }
        self
    }
}

#[async_trait]
impl TextCorrector for ScriptedTextCorrector {
    async fn correct(&self, text: &str) -> Result<CorrectionVerdict, CorrectionError> {
        if word_count(text) < MIN_ANSWER_WORDS {
            return Err(CorrectionError::TooFewWords);
        }

        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(CorrectionError::Service("script exhausted".to_string())))
    }
}
