//! Chat-completion wire types shared by the reply generator and the text
//! corrector.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatMessage,
}

/// Failure of one chat-completion call, mapped into the caller's own error
/// type at each call site.
#[derive(Debug)]
pub(crate) enum ChatCallError {
    Network(String),
    Service(String),
    InvalidResponse(String),
}

/// Send one chat completion and return the assistant's trimmed reply text.
pub(crate) async fn chat_completion(
    client: &reqwest::Client,
    api_base: &str,
    api_key: &str,
    request: &ChatCompletionRequest,
) -> Result<String, ChatCallError> {
    let url = format!("{}/chat/completions", api_base.trim_end_matches('/'));

    let response = client
        .post(&url)
        .bearer_auth(api_key)
        .json(request)
        .send()
        .await
        .map_err(|e| ChatCallError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ChatCallError::Service(format!("status {status}: {body}")));
    }

    let completion: ChatCompletionResponse = response
        .json()
        .await
        .map_err(|e| ChatCallError::InvalidResponse(e.to_string()))?;

    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| ChatCallError::InvalidResponse("empty completion".to_string()))
}
