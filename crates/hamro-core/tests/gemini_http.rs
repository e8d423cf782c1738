use hamro_core::{ChatSession, Config, ErrorKind, GeminiClient};
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;

const FLASH_PATH: &str = "/v1beta/models/gemini-3-flash-preview:generateContent";

fn session_for(server: &MockServer, key: &str) -> ChatSession {
    let config = Config {
        api_base: Some(server.base_url()),
        timeout_seconds: Some(5),
        ..Config::new()
    };
    ChatSession::from_config(&config, key).unwrap()
}

#[tokio::test]
async fn reply_text_is_returned_and_key_is_sent_as_header() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path(FLASH_PATH)
            .header("x-goog-api-key", "test-key")
            .body_contains("\"systemInstruction\"")
            .body_contains("\"temperature\":0.7");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "Hi there" }] },
                    "finishReason": "STOP"
                }]
            }));
    });

    let mut session = session_for(&server, "test-key");
    let reply = session
        .send_message("Hello", "gemini-3-flash-preview", &[])
        .await
        .unwrap();

    mock.assert();
    assert_eq!(reply, "Hi there");
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn rate_limit_maps_to_quota_and_keeps_history() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(POST).path(FLASH_PATH);
        then.status(429)
            .header("content-type", "application/json")
            .json_body(json!({
                "error": {
                    "code": 429,
                    "message": "Resource has been exhausted (e.g. check quota).",
                    "status": "RESOURCE_EXHAUSTED"
                }
            }));
    });

    let mut session = session_for(&server, "test-key");
    let err = session
        .send_message("Hello", "gemini-3-flash-preview", &[])
        .await
        .unwrap_err();

    mock.assert();
    assert_eq!(err.kind(), ErrorKind::Quota);
    assert!(err.to_string().contains("429"));
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn invalid_key_maps_to_auth() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST).path(FLASH_PATH);
        then.status(400).json_body(json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT",
                "details": [{
                    "@type": "type.googleapis.com/google.rpc.ErrorInfo",
                    "reason": "API_KEY_INVALID"
                }]
            }
        }));
    });

    let mut session = session_for(&server, "bad-key");
    let err = session
        .send_message("Hello", "gemini-3-flash-preview", &[])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Auth);
    assert!(err.offers_key_reselect());
}

#[tokio::test]
async fn blocked_prompt_maps_to_safety() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST).path(FLASH_PATH);
        then.status(200).json_body(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }));
    });

    let mut session = session_for(&server, "test-key");
    let err = session
        .send_message("something unsafe", "gemini-3-flash-preview", &[])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Safety);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn empty_key_fails_before_any_request() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST);
        then.status(200);
    });

    let client = GeminiClient::with_options("", &server.base_url(), 5).unwrap();
    let mut session = ChatSession::new(Arc::new(client), "persona".to_string());
    let err = session
        .send_message("Hello", "gemini-3-flash-preview", &[])
        .await
        .unwrap_err();

    mock.assert_hits(0);
    assert_eq!(err.kind(), ErrorKind::Auth);
}
