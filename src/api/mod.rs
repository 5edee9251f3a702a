//! HTTP API server for kiwi voice

pub mod health;
pub mod session;
pub mod tools;
pub mod tts;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::session::SessionHandle;
use crate::tools::ToolRegistry;
use crate::voice::{DetectionFeed, TextToSpeech};
use crate::{Error, Result};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Upstream speech client; absent without an API key
    pub speech: Option<TextToSpeech>,
    /// Session coordinator; absent when voice is disabled
    pub session: Option<SessionHandle>,
    /// Injection point into the wake word engine
    pub detections: Option<DetectionFeed>,
    pub tools: Arc<ToolRegistry>,
}

/// API errors, rendered as `{"error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    NotConfigured(&'static str),
    BadRequest(String),
    NotFound(String),
    Unprocessable(String),
    Unavailable(String),
    Internal(&'static str),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::WakeWord(msg) => Self::BadRequest(msg),
            Error::Session(msg) => Self::Unavailable(msg),
            other => {
                tracing::error!(error = %other, "request failed");
                Self::Internal("internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        let (status, message) = match self {
            Self::NotConfigured(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.to_string()),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    port: u16,
    speech: Option<TextToSpeech>,
    session: Option<SessionHandle>,
    detections: Option<DetectionFeed>,
    tools: ToolRegistry,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            port,
            speech: None,
            session: None,
            detections: None,
            tools: ToolRegistry::new(),
        }
    }

    /// Set the upstream speech client behind `/api/tts`
    #[must_use]
    pub fn speech(mut self, speech: TextToSpeech) -> Self {
        self.speech = Some(speech);
        self
    }

    /// Set the session coordinator handle
    #[must_use]
    pub fn session(mut self, handle: SessionHandle) -> Self {
        self.session = Some(handle);
        self
    }

    /// Set the detection injection feed
    #[must_use]
    pub fn detections(mut self, feed: DetectionFeed) -> Self {
        self.detections = Some(feed);
        self
    }

    /// Set the tool registry
    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let state = Arc::new(ApiState {
            speech: self.speech,
            session: self.session,
            detections: self.detections,
            tools: Arc::new(self.tools),
        });

        ApiServer {
            state,
            port: self.port,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let router = Router::new()
            .merge(tts::router(self.state.clone()))
            .nest("/api", session::router(self.state.clone()))
            .merge(tools::router(self.state.clone()))
            .merge(health::router())
            .merge(health::ready_router(self.state.clone()));

        // CORS layer for cross-origin requests from frontend
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
