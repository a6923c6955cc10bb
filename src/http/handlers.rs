use super::state::AppState;
use crate::audio::RecordedAudio;
use crate::services::{CorrectionError, ReplyRequest, TranscriptionError};
use crate::session::ProficiencyLevel;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

const DEFAULT_AUDIO_MIME: &str = "audio/webm;codecs=opus";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SpeechToTextRequest {
    /// Base64 data-URL or bare base64 of the recorded audio
    pub audio: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SpeechToTextResponse {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReplyRequest {
    pub text: Option<String>,
    pub level: Option<ProficiencyLevel>,
    #[serde(default)]
    pub is_initial_greeting: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerateReplyResponse {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CorrectTextRequest {
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectTextResponse {
    pub corrected_text: String,
    pub is_correct: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/speech-to-text
/// Transcribe one recorded audio artifact
pub async fn speech_to_text(
    State(state): State<AppState>,
    Json(req): Json<SpeechToTextRequest>,
) -> impl IntoResponse {
    let Some(audio) = req.audio.filter(|a| !a.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Geen audio data ontvangen");
    };

    info!("audio data received, length: {}", audio.len());

    // Strip the data-URL prefix, keeping the declared MIME type
    let marker = ";base64,";
    let (mime_type, payload) = match audio.find(marker) {
        Some(idx) => {
            let header = &audio[..idx];
            let mime = header.strip_prefix("data:").unwrap_or(header).to_string();
            (mime, audio[idx + marker.len()..].to_string())
        }
        None => (DEFAULT_AUDIO_MIME.to_string(), audio),
    };

    let bytes = match base64::engine::general_purpose::STANDARD.decode(payload.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("failed to decode audio payload: {e}");
            return error_response(
                StatusCode::BAD_REQUEST,
                "Audio kon niet worden verwerkt. Probeer het opnieuw.",
            );
        }
    };

    let recorded = RecordedAudio { bytes, mime_type };

    match state.transcriber.transcribe(&recorded, &state.language).await {
        Ok(text) => Json(SpeechToTextResponse { text }).into_response(),
        Err(e) => {
            error!("speech-to-text failed: {e}");
            let message = match &e {
                TranscriptionError::Network(_) => {
                    "Netwerk fout. Controleer je internetverbinding."
                }
                TranscriptionError::Service(detail)
                    if detail.to_lowercase().contains("api key") =>
                {
                    "OpenAI API key is niet geldig. Controleer je configuratie."
                }
                _ => "Er is een fout opgetreden bij het verwerken van de spraak",
            };
            error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }
}

/// POST /api/generate-reply
/// Generate the baker's reply, or return the scripted greeting
pub async fn generate_reply(
    State(state): State<AppState>,
    Json(req): Json<GenerateReplyRequest>,
) -> impl IntoResponse {
    let Some(level) = req.level else {
        return error_response(StatusCode::BAD_REQUEST, "Geen niveau opgegeven");
    };

    let request = if req.is_initial_greeting {
        ReplyRequest::greeting(level)
    } else {
        let Some(text) = req.text.filter(|t| !t.trim().is_empty()) else {
            return error_response(StatusCode::BAD_REQUEST, "Geen tekst opgegeven");
        };
        ReplyRequest::message(text, level)
    };

    match state.generator.generate(&request).await {
        Ok(text) => Json(GenerateReplyResponse { text }).into_response(),
        Err(e) => {
            error!("reply generation failed: {e}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Er is een fout opgetreden bij het genereren van de tekst",
            )
        }
    }
}

/// POST /api/correct-text
/// Check an answer's grammar and return the corrected text
pub async fn correct_text(
    State(state): State<AppState>,
    Json(req): Json<CorrectTextRequest>,
) -> impl IntoResponse {
    let Some(text) = req.text.filter(|t| !t.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Tekst is vereist");
    };

    match state.corrector.correct(&text).await {
        Ok(verdict) => Json(CorrectTextResponse {
            corrected_text: verdict.corrected_text,
            is_correct: verdict.is_correct,
        })
        .into_response(),
        Err(CorrectionError::TooFewWords) => error_response(
            StatusCode::BAD_REQUEST,
            "Uw antwoord moet minimaal 5 woorden bevatten",
        ),
        Err(e) => {
            error!("text correction failed: {e}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Er is een fout opgetreden bij het verbeteren van de tekst",
            )
        }
    }
}

/// GET /health
/// Health check
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
