//! Speech synthesis endpoint
//!
//! Proxies `{ input, voice, model }` to the upstream speech API and returns
//! MP3 bytes.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::{ApiError, ApiState};
use crate::voice::{SpeechRequest, TTS_PATH};

/// Build TTS router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route(TTS_PATH, post(synthesize))
        .with_state(state)
}

/// Synthesize text to speech
async fn synthesize(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SpeechRequest>,
) -> Result<Response, ApiError> {
    let speech = state
        .speech
        .as_ref()
        .ok_or(ApiError::NotConfigured("TTS not configured"))?;

    if request.input.trim().is_empty() {
        return Err(ApiError::BadRequest("Empty input".to_string()));
    }

    let audio = speech.synthesize_request(&request).await.map_err(|e| {
        tracing::error!(error = %e, "TTS API error");
        ApiError::Internal("Failed to generate speech")
    })?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}
