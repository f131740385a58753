// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Agent backend client
//
// Starts a streaming run on the agent backend and hands back its raw SSE
// body. Transport is behind `HttpSender` so the backend logic can be
// tested without a network.

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use futures_util::stream::Stream;
use futures_util::TryStreamExt;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use crate::config::BackendConfig;

/// Raw response body chunks, as they arrive.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

// ---------------------------------------------------------------------------
// Interfaces
// ---------------------------------------------------------------------------

/// Starts agent runs and returns the streaming response body.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn run(&self, request: RunRequest) -> Result<ByteStream, BackendError>;
}

/// Sends HTTP requests to the agent backend.
#[async_trait]
pub trait HttpSender: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

// ---------------------------------------------------------------------------
// Run request body
// ---------------------------------------------------------------------------

/// Body of a streaming run request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub new_message: NewMessage,
    pub streaming: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMessage {
    pub role: String,
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessagePart {
    pub text: String,
}

impl RunRequest {
    /// A streaming run carrying one user text message.
    pub fn user_text(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            new_message: NewMessage {
                role: "user".to_string(),
                parts: vec![MessagePart { text: text.into() }],
            },
            streaming: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Transport types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// `None` when the response carries no body at all.
    pub body: Option<ByteStream>,
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("backend request failed: {0}")]
    Transport(String),
    #[error("backend request timed out: {0}")]
    Timeout(String),
}

/// Failure to start a run. Nothing has been streamed when this is returned.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("agent backend unreachable: {0}")]
    Transport(String),

    #[error("agent backend timed out: {0}")]
    Timeout(String),

    #[error("agent backend returned status {0}")]
    Status(StatusCode),

    #[error("agent backend returned no response body")]
    MissingBody,

    #[error("failed to encode run request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<HttpError> for BackendError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Transport(msg) => BackendError::Transport(msg),
            HttpError::Timeout(msg) => BackendError::Timeout(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// ADK backend
// ---------------------------------------------------------------------------

/// Agent backend reached over HTTP at `{base_url}{run_path}`.
pub struct AdkBackend {
    http: Arc<dyn HttpSender>,
    config: BackendConfig,
}

impl AdkBackend {
    pub fn new(http: Arc<dyn HttpSender>, config: BackendConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl AgentBackend for AdkBackend {
    async fn run(&self, request: RunRequest) -> Result<ByteStream, BackendError> {
        let started = Instant::now();
        let body = serde_json::to_vec(&request)?;

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));

        let url = self.config.run_url();
        tracing::debug!(
            url = %url,
            app_name = %request.app_name,
            user_id = %request.user_id,
            session_id = %request.session_id,
            "starting agent run"
        );

        let response = self
            .http
            .send(HttpRequest {
                method: Method::POST,
                url,
                headers,
                body: Bytes::from(body),
            })
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "agent backend request failed");
                BackendError::from(e)
            })?;

        tracing::info!(
            app_name = %request.app_name,
            session_id = %request.session_id,
            status = response.status.as_u16(),
            latency_ms = started.elapsed().as_secs_f64() * 1000.0,
            "agent run started"
        );

        if !response.status.is_success() {
            return Err(BackendError::Status(response.status));
        }
        response.body.ok_or(BackendError::MissingBody)
    }
}

// ---------------------------------------------------------------------------
// Reqwest HTTP sender
// ---------------------------------------------------------------------------

pub struct ReqwestHttpSender {
    client: reqwest::Client,
}

impl ReqwestHttpSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Client with the configured connect timeout. There is no overall
    /// request timeout: a run streams for as long as the agent talks.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl HttpSender for ReqwestHttpSender {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let resp = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    HttpError::Timeout(e.to_string())
                } else {
                    HttpError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        let headers = resp.headers().clone();

        let body = if status == StatusCode::NO_CONTENT {
            None
        } else {
            let stream = resp
                .bytes_stream()
                .map_err(|e| HttpError::Transport(e.to_string()));
            Some(Box::pin(stream) as ByteStream)
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
