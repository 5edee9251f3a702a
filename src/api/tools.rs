//! Tool listing and execution endpoints

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use super::{ApiError, ApiState};
use crate::session::Activity;
use crate::tools::ToolDefinition;

/// Build tools router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/tools", get(list))
        .route("/api/tools/{name}", post(call))
        .with_state(state)
}

async fn list(State(state): State<Arc<ApiState>>) -> Json<Vec<ToolDefinition>> {
    Json(state.tools.definitions())
}

/// Execute a tool; the body is the JSON arguments object
async fn call(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    if !state.tools.contains(&name) {
        return Err(ApiError::NotFound(format!("unknown tool: {name}")));
    }

    let arguments = String::from_utf8_lossy(&body);
    let result = state
        .tools
        .execute(&name, &arguments)
        .await
        .map_err(|e| ApiError::Unprocessable(e.to_string()))?;

    // A tool call is conversation activity
    if let Some(session) = &state.session {
        if let Err(e) = session.activity(Activity::ToolCall).await {
            tracing::warn!(error = %e, "failed to report tool activity");
        }
    }

    Ok(([(header::CONTENT_TYPE, "application/json")], result).into_response())
}
