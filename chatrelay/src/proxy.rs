// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// HTTP front end
//
// Responsibilities:
// - Parse chat requests and pick the latest user message
// - Resolve the user/session identity for the agent run
// - Start the run via the injected AgentBackend
// - Stream the re-framed response with data-stream headers
// - JSON error envelope for request-level failures
// - Heartbeat endpoint

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::backend::{AgentBackend, BackendError, RunRequest};
use crate::config::{Config, IdentityConfig};
use crate::stream::{policy_for, AdkEventClassifier, StreamContext, StreamProcessor};

/// Response header announcing the data-stream protocol version.
pub const DATA_STREAM_HEADER: HeaderName = HeaderName::from_static("x-vercel-ai-data-stream");

/// The address the relay binds to. Always localhost, never 0.0.0.0.
pub const BIND_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 3000);

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: MessageContent,
}

/// Message content: a plain string or a list of typed parts.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: Option<String>,
}

impl MessageContent {
    /// The message text. Text parts are joined with newlines; other parts
    /// are ignored.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|p| p.kind.as_deref().map_or(true, |k| k == "text"))
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl ChatRequest {
    /// Text of the most recent user message.
    pub fn last_user_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.text())
    }
}

/// Who the agent run is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub session_id: String,
}

/// Request values win; then configured defaults; a session id is
/// generated when neither is present.
pub fn resolve_identity(request: &ChatRequest, defaults: &IdentityConfig) -> Identity {
    let user_id = request
        .user_id
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| defaults.default_user_id.clone());
    let session_id = request
        .session_id
        .clone()
        .filter(|s| !s.is_empty())
        .or_else(|| defaults.default_session_id.clone())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    Identity {
        user_id,
        session_id,
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures before any frame has been streamed.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("malformed chat request: {0}")]
    MalformedRequest(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::MalformedRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ChatError::Backend(BackendError::Transport(_)) => StatusCode::BAD_GATEWAY,
            ChatError::Backend(BackendError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ChatError::Backend(BackendError::Status(_)) => StatusCode::BAD_GATEWAY,
            ChatError::Backend(BackendError::MissingBody) => StatusCode::INTERNAL_SERVER_ERROR,
            ChatError::Backend(BackendError::Encode(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({ "detail": self.to_string() });
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn AgentBackend>,
    pub processor: Arc<StreamProcessor>,
    pub config: Arc<Config>,
    pub stream_format: HeaderValue,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Heartbeat endpoint: GET /v1/heartbeat -> 200 OK
pub async fn heartbeat() -> StatusCode {
    StatusCode::OK
}

/// Chat endpoint: POST /api/chat -> re-framed agent stream.
pub async fn chat_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ChatError> {
    let request_id = Uuid::new_v4().to_string();

    let request: ChatRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(request_id = %request_id, error = %e, "rejecting chat request");
        ChatError::MalformedRequest(e.to_string())
    })?;
    let text = request.last_user_text().ok_or_else(|| {
        tracing::warn!(request_id = %request_id, "chat request has no user message");
        ChatError::MalformedRequest("no user message".to_string())
    })?;
    let identity = resolve_identity(&request, &state.config.identity);

    tracing::info!(
        request_id = %request_id,
        user_id = %identity.user_id,
        session_id = %identity.session_id,
        messages = request.messages.len(),
        text_chars = text.chars().count(),
        "chat request"
    );

    let run = RunRequest::user_text(
        state.config.backend.app_name.clone(),
        identity.user_id,
        identity.session_id,
        text,
    );
    let upstream = state.backend.run(run).await.map_err(|e| {
        tracing::error!(request_id = %request_id, error = %e, "agent run failed");
        ChatError::Backend(e)
    })?;

    let frames = state
        .processor
        .process(upstream, StreamContext { request_id });
    let mut response = Body::from_stream(frames.map(Ok::<Bytes, Infallible>)).into_response();

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(DATA_STREAM_HEADER, state.stream_format.clone());
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    Ok(response)
}

// ---------------------------------------------------------------------------
// Router construction
// ---------------------------------------------------------------------------

/// Build the axum router with the chat and heartbeat endpoints.
///
/// The agent backend is injected; the stream processor is built from the
/// config's stream section.
pub fn build_router(backend: Arc<dyn AgentBackend>, config: Arc<Config>) -> Router {
    let classifier = Arc::new(AdkEventClassifier::from_config(&config.stream));
    let policy = policy_for(config.stream.partial_policy);
    let processor = StreamProcessor::new(classifier, policy)
        .with_channel_capacity(config.stream.channel_capacity)
        .with_max_record_bytes(config.stream.max_record_bytes);
    let stream_format = HeaderValue::from_str(&config.stream.format_version)
        .unwrap_or_else(|_| HeaderValue::from_static("v1"));

    let state = AppState {
        backend,
        processor: Arc::new(processor),
        config,
        stream_format,
    };

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/v1/heartbeat", get(heartbeat))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
