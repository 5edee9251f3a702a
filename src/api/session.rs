//! Session control endpoints
//!
//! Feed explicit requests and externally detected labels into the session
//! coordinator.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};
use crate::session::{Activity, EndReason, SessionHandle, SessionSnapshot, SubscriptionState};
use crate::voice::Delivery;

/// Build session router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/session", get(status))
        .route("/session/start", post(start))
        .route("/session/end", post(end))
        .route("/session/activity", post(activity))
        .route("/wake", post(wake))
        .with_state(state)
}

/// Session state as exposed over HTTP
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub active: bool,
    pub subscription: SubscriptionState,
    pub idle_remaining_ms: Option<u64>,
    pub detector_fault: bool,
    pub sessions_started: u64,
    pub sessions_ended: u64,
    pub last_end_reason: Option<EndReason>,
}

impl From<SessionSnapshot> for SessionView {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            active: snapshot.active,
            subscription: snapshot.subscription,
            idle_remaining_ms: snapshot
                .idle_remaining()
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            detector_fault: snapshot.detector_fault,
            sessions_started: snapshot.sessions_started,
            sessions_ended: snapshot.sessions_ended,
            last_end_reason: snapshot.last_end_reason,
        }
    }
}

/// Activity report
#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub activity: Activity,
}

/// Detection injection; exactly one of `label` or `transcript`
#[derive(Debug, Deserialize)]
pub struct WakeRequest {
    pub label: Option<String>,
    pub transcript: Option<String>,
}

fn coordinator(state: &ApiState) -> Result<&SessionHandle, ApiError> {
    state
        .session
        .as_ref()
        .ok_or(ApiError::NotConfigured("voice session not enabled"))
}

async fn status(State(state): State<Arc<ApiState>>) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(coordinator(&state)?.snapshot().into()))
}

async fn start(State(state): State<Arc<ApiState>>) -> Result<Json<SessionView>, ApiError> {
    let snapshot = coordinator(&state)?.start().await?;
    Ok(Json(snapshot.into()))
}

async fn end(State(state): State<Arc<ApiState>>) -> Result<Json<SessionView>, ApiError> {
    let snapshot = coordinator(&state)?.end().await?;
    Ok(Json(snapshot.into()))
}

/// Report activity; an empty body counts as user speech
async fn activity(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<SessionView>, ApiError> {
    let activity = if body.is_empty() {
        Activity::UserSpeech
    } else {
        serde_json::from_slice::<ActivityRequest>(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid activity: {e}")))?
            .activity
    };

    let snapshot = coordinator(&state)?.activity(activity).await?;
    Ok(Json(snapshot.into()))
}

/// Inject a detection through the wake word engine
///
/// Goes through the subscription gate, so detections sent while the
/// assistant is speaking are dropped.
async fn wake(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<WakeRequest>,
) -> Result<Json<Delivery>, ApiError> {
    let feed = state
        .detections
        .as_ref()
        .ok_or(ApiError::NotConfigured("wake word detection not enabled"))?;

    let delivery = match (request.label, request.transcript) {
        (Some(label), None) => feed.detect_label(&label)?,
        (None, Some(transcript)) => feed.detect_transcript(&transcript),
        _ => {
            return Err(ApiError::BadRequest(
                "exactly one of label or transcript required".to_string(),
            ));
        }
    };

    Ok(Json(delivery))
}
