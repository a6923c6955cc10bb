//! HTTP API exposing the conversation services
//!
//! This module provides the REST surface the practice front-end talks to:
//! - POST /api/speech-to-text - transcribe one recorded answer
//! - POST /api/generate-reply - baker reply or scripted greeting
//! - POST /api/correct-text - grammar verdict for a typed answer
//! - GET /health - health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
