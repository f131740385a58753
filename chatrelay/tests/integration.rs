// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Integration tests
//
// End-to-end tests exercising the full relay pipeline:
// chat request -> identity -> agent run -> SSE decode -> re-encode -> response
//
// Uses wiremock as the agent backend, tower::ServiceExt::oneshot for
// in-process HTTP, and the real reqwest sender (no mocks except the
// HTTP target).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use chatrelay::backend::{AdkBackend, ReqwestHttpSender};
use chatrelay::config::{self, StringSource};
use chatrelay::proxy;
use chatrelay::stream::{parse_frame, OutputFrame};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Infrastructure
// ---------------------------------------------------------------------------

fn test_yaml(base_url: &str, extra: &str) -> String {
    format!(
        r#"chatrelay: v1

backend:
  base_url: {base_url}
  app_name: agent
  connect_timeout_ms: 1000

identity:
  default_user_id: u_123
  default_session_id: s_123
{extra}"#
    )
}

/// Build the real router with the reqwest sender pointed at `base_url`.
fn build_app(yaml: &str) -> axum::Router {
    let config = Arc::new(
        config::load_config(&StringSource::new(yaml)).expect("test config should parse"),
    );
    let sender = Arc::new(
        ReqwestHttpSender::from_config(&config.backend).expect("client should build"),
    );
    let backend = Arc::new(AdkBackend::new(sender, config.backend.clone()));
    proxy::build_router(backend, config)
}

fn chat_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Bytes {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
}

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream")
}

const AGENT_STREAM: &str = concat!(
    "data: {\"content\":{\"parts\":[{\"text\":\"Rust is\"}],\"role\":\"model\"},\"partial\":true,\"author\":\"agent\"}\n\n",
    "data: {\"content\":{\"parts\":[{\"text\":\" a systems language.\"}],\"role\":\"model\"},\"partial\":true,\"author\":\"agent\"}\n\n",
    "data: {\"type\":\"sources\",\"data\":{\"nodes\":[{\"id\":\"1\",\"url\":\"/sample.pdf\"}]}}\n\n",
    "data: {\"content\":{\"parts\":[{\"text\":\"Rust is a systems language.\"}],\"role\":\"model\"},\"author\":\"agent\"}\n\n",
    "data: {\"actions\":{\"stateDelta\":{}},\"author\":\"agent\"}\n\n",
);

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn agent_stream_is_reframed_end_to_end() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/run_sse"))
        .respond_with(sse(AGENT_STREAM))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = build_app(&test_yaml(&mock_server.uri(), ""));
    let resp = app
        .oneshot(chat_request(
            r#"{"messages":[{"role":"user","content":"What is Rust?"}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "text/plain; charset=utf-8");
    assert_eq!(resp.headers()["x-vercel-ai-data-stream"], "v1");
    assert_eq!(resp.headers()["cache-control"], "no-cache");

    let body = body_bytes(resp).await;
    let text = std::str::from_utf8(&body).unwrap();
    let frames: Vec<OutputFrame> = text.lines().map(|l| parse_frame(l).unwrap()).collect();
    assert_eq!(
        frames,
        vec![
            OutputFrame::Text("Rust is".into()),
            OutputFrame::Text(" a systems language.".into()),
            OutputFrame::Annotation(json!({
                "type": "sources",
                "data": {"nodes": [{"id": "1", "url": "/sample.pdf"}]}
            })),
        ]
    );
}

#[tokio::test]
async fn crlf_framed_backend_is_supported() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/run_sse"))
        .respond_with(sse(
            "data: {\"content\":{\"parts\":[{\"text\":\"Hi\"}]},\"partial\":true}\r\n\r\n",
        ))
        .mount(&mock_server)
        .await;

    let app = build_app(&test_yaml(&mock_server.uri(), ""));
    let resp = app
        .oneshot(chat_request(r#"{"messages":[{"role":"user","content":"hi"}]}"#))
        .await
        .unwrap();
    assert_eq!(body_bytes(resp).await, Bytes::from_static(b"0:\"Hi\"\n"));
}

#[tokio::test]
async fn require_partial_policy_from_config() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/run_sse"))
        .respond_with(sse(
            "data: {\"content\":{\"parts\":[{\"text\":\"Complete answer\"}]}}\n\n",
        ))
        .mount(&mock_server)
        .await;

    let yaml = test_yaml(&mock_server.uri(), "stream:\n  partial_policy: require_partial\n");
    let resp = build_app(&yaml)
        .oneshot(chat_request(r#"{"messages":[{"role":"user","content":"hi"}]}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_bytes(resp).await.is_empty());
}

// ---------------------------------------------------------------------------
// Backend request
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_request_body_matches_agent_contract() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agents/run_sse"))
        .and(header("accept", "text/event-stream"))
        .and(body_partial_json(json!({
            "appName": "agent",
            "userId": "alice",
            "sessionId": "s_123",
            "newMessage": {"role": "user", "parts": [{"text": "second question"}]},
            "streaming": true
        })))
        .respond_with(sse(""))
        .expect(1)
        .mount(&mock_server)
        .await;

    let base = format!("{}/", mock_server.uri());
    let yaml = test_yaml(&base, "").replace(
        "  app_name: agent\n",
        "  app_name: agent\n  run_path: /agents/run_sse\n",
    );
    let body = r#"{"userId":"alice","messages":[
        {"role":"user","content":"first question"},
        {"role":"assistant","content":"first answer"},
        {"role":"user","content":[{"type":"text","text":"second question"}]}
    ]}"#;

    let resp = build_app(&yaml).oneshot(chat_request(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // Drain so the request has completed before the mock verifies.
    body_bytes(resp).await;
}

// ---------------------------------------------------------------------------
// Request-level errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backend_error_status_returns_502_with_detail() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/run_sse"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "agent crashed"})))
        .mount(&mock_server)
        .await;

    let resp = build_app(&test_yaml(&mock_server.uri(), ""))
        .oneshot(chat_request(r#"{"messages":[{"role":"user","content":"hi"}]}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert!(body["detail"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn unreachable_backend_returns_502() {
    // Bind then release a port so nothing is listening on it.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let resp = build_app(&test_yaml(&format!("http://{addr}"), ""))
        .oneshot(chat_request(r#"{"messages":[{"role":"user","content":"hi"}]}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn malformed_chat_request_never_reaches_backend() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse(""))
        .expect(0)
        .mount(&mock_server)
        .await;

    let resp = build_app(&test_yaml(&mock_server.uri(), ""))
        .oneshot(chat_request(r#"{"messages": "nope"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
