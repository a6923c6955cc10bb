use super::chat::{chat_completion, ChatCallError, ChatCompletionRequest, ChatMessage};
use crate::session::ProficiencyLevel;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

/// One request to the response generation service.
///
/// Each turn is stateless from the server's point of view: no conversation
/// history travels with the request.
#[derive(Debug, Clone)]
pub struct ReplyRequest {
    pub user_text: String,
    pub level: ProficiencyLevel,
    /// When set, `user_text` is ignored and a level-appropriate scripted
    /// greeting is returned.
    pub initial_greeting: bool,
}

impl ReplyRequest {
    pub fn message(user_text: impl Into<String>, level: ProficiencyLevel) -> Self {
        Self {
            user_text: user_text.into(),
            level,
            initial_greeting: false,
        }
    }

    pub fn greeting(level: ProficiencyLevel) -> Self {
        Self {
            user_text: String::new(),
            level,
            initial_greeting: true,
        }
    }
}

/// Errors from the response generation service
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("generation service error: {0}")]
    Service(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),

    /// The request was aborted by its issuer; treated as silent
    /// cancellation, never surfaced to the user.
    #[error("request cancelled")]
    Cancelled,
}

/// Response generation service interface
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, request: &ReplyRequest) -> Result<String, GenerationError>;
}

/// The scripted opening line of the baker, per proficiency level.
pub fn scripted_greeting(level: ProficiencyLevel) -> &'static str {
    match level {
        ProficiencyLevel::A1 => "Hallo! Ik ben de bakker. Wat wilt u kopen? Ik heb brood en koekjes.",
        ProficiencyLevel::A2 => {
            "Hallo! Ik ben de bakker. Hoe kan ik u vandaag helpen? U kunt met mij praten over \
             brood, koekjes of andere lekkere dingen uit mijn winkel."
        }
        ProficiencyLevel::B1 => {
            "Goedemorgen! Welkom in mijn bakkerij. Waarmee kan ik u vandaag van dienst zijn? We \
             hebben vers brood, broodjes en verschillende soorten koekjes."
        }
    }
}

/// System prompt for the baker persona, parameterized by proficiency level.
pub fn level_system_prompt(level: ProficiencyLevel) -> String {
    let guidance = match level {
        ProficiencyLevel::A1 => {
            "Gebruik alleen zeer eenvoudige woorden en zinnen van maximaal vijf woorden. \
             Herhaal de belangrijkste woorden vaak."
        }
        ProficiencyLevel::A2 => {
            "Gebruik eenvoudige woorden en korte zinnen. Herhaal belangrijke woorden."
        }
        ProficiencyLevel::B1 => {
            "Gebruik alledaagse taal en iets langere zinnen, maar vermijd moeilijke woorden."
        }
    };

    format!(
        "Je bent een vriendelijke Nederlandse bakker die praat met mensen die Nederlands leren \
         (niveau {level}). {guidance} Spreek langzaam en duidelijk. Gebruik veelgebruikte \
         uitdrukkingen die je in een bakkerij hoort. Houd je antwoorden kort (maximaal 2 zinnen) \
         en gebruik woorden die je vaak in het dagelijks leven hoort. Als je een moeilijk woord \
         gebruikt, leg het dan uit met eenvoudigere woorden."
    )
}

/// Baker replies over an OpenAI-compatible chat completion endpoint.
///
/// Greeting requests short-circuit to the scripted greeting without a
/// network call.
pub struct OpenAiReplyGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiReplyGenerator {
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
impl ReplyGenerator for OpenAiReplyGenerator {
    async fn generate(&self, request: &ReplyRequest) -> Result<String, GenerationError> {
        if request.initial_greeting {
            info!("returning scripted greeting for level {}", request.level);
            return Ok(scripted_greeting(request.level).to_string());
        }

        let chat_request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(level_system_prompt(request.level)),
                ChatMessage::user(request.user_text.clone()),
            ],
            max_tokens: 150,
            temperature: 0.7,
        };

        info!(
            "generating reply for {} chars of user text (level {})",
            request.user_text.len(),
            request.level
        );

        chat_completion(&self.client, &self.api_base, &self.api_key, &chat_request)
            .await
            .map_err(|e| match e {
                ChatCallError::Network(m) => GenerationError::Network(m),
                ChatCallError::Service(m) => GenerationError::Service(m),
                ChatCallError::InvalidResponse(m) => GenerationError::InvalidResponse(m),
            })
    }
}

/// In-process generator for tests and demos.
///
/// Greeting requests return a deterministic per-level line; message requests
/// consume the script queue. An optional delay keeps requests in flight long
/// enough to exercise cancellation.
#[derive(Default)]
pub struct ScriptedReplyGenerator {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    received: Mutex<Vec<ReplyRequest>>,
    delay: Option<Duration>,
}

impl ScriptedReplyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful reply for the next message request
    pub fn reply(self, text: impl Into<String>) -> Self {
        if let Ok(mut script) = self.script.try_lock() {
            script.push_back(Ok(text.into()));
        }
        self
    }

    /// Queue a failure for the next message request
    pub fn failure(self, error: GenerationError) -> Self {
        if let Ok(mut script) = self.script.try_lock() {
            script.push_back(Err(error));
        }
        self
    }

    /// Every request received, in order
    pub async fn received(&self) -> Vec<ReplyRequest> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl ReplyGenerator for ScriptedReplyGenerator {
    async fn generate(&self, request: &ReplyRequest) -> Result<String, GenerationError> {
        self.received.lock().await.push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if request.initial_greeting {
            return Ok(format!("Hallo! Ik ben de bakker. ({})", request.level));
        }

        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::Service("script exhausted".to_string())))
    }
}
