// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;

use super::{generate, RelayService};
use crate::generate::testing::ScriptedClient;
use crate::generate::GenerationError;

fn service_with(
    client: Arc<ScriptedClient>,
    api_key: Option<&str>,
) -> State<Arc<RelayService>> {
    State(Arc::new(RelayService::new(client, api_key.map(str::to_owned))))
}

#[tokio::test]
async fn missing_prompt_is_rejected() {
    let client = Arc::new(ScriptedClient::new([]));
    let state = service_with(client.clone(), Some("sk-relay"));

    let (status, body) = generate(state, "{}".to_owned()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.0["error"], "Prompt is required and must be a string");
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn non_string_prompt_is_rejected() {
    let client = Arc::new(ScriptedClient::new([]));
    let state = service_with(client.clone(), Some("sk-relay"));

    let (status, body) = generate(state, r#"{"prompt": 42}"#.to_owned()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.0["error"], "Prompt is required and must be a string");
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn blank_prompt_is_rejected() {
    let client = Arc::new(ScriptedClient::new([]));
    let state = service_with(client.clone(), Some("sk-relay"));

    let (status, _) = generate(state, r#"{"prompt": "   "}"#.to_owned()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let client = Arc::new(ScriptedClient::new([]));
    let state = service_with(client.clone(), Some("sk-relay"));

    let (status, body) = generate(state, "not json".to_owned()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.0["error"], "Prompt is required and must be a string");
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn missing_server_credential_is_a_server_error() {
    let client = Arc::new(ScriptedClient::new([]));
    let state = service_with(client.clone(), None);

    let (status, body) =
        generate(state, r#"{"prompt": "flowchart for login"}"#.to_owned()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.0["error"], "OpenAI API key not configured");
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn empty_server_credential_counts_as_missing() {
    let client = Arc::new(ScriptedClient::new([]));
    let state = service_with(client.clone(), Some(""));

    let (status, _) =
        generate(state, r#"{"prompt": "flowchart for login"}"#.to_owned()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn success_replies_with_the_generated_code() {
    let client = Arc::new(ScriptedClient::new([Ok("graph TD\nA-->B".to_owned())]));
    let state = service_with(client.clone(), Some("sk-relay"));

    let (status, body) =
        generate(state, r#"{"prompt": "flowchart for login"}"#.to_owned()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.0["code"], "graph TD\nA-->B");
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn upstream_status_is_passed_through() {
    let err = GenerationError::Remote {
        status: Some(401),
        message: "OpenAI API error: 401".to_owned(),
    };
    let client = Arc::new(ScriptedClient::new([Err(err)]));
    let state = service_with(client, Some("sk-relay"));

    let (status, body) =
        generate(state, r#"{"prompt": "flowchart for login"}"#.to_owned()).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.0["error"], "OpenAI API error: 401");
}

#[tokio::test]
async fn non_2xx_embedded_error_message_is_replaced_with_generic_text() {
    // The direct client surfaces the embedded message; the relay does not.
    let err = GenerationError::Remote {
        status: Some(401),
        message: "invalid credential".to_owned(),
    };
    let client = Arc::new(ScriptedClient::new([Err(err)]));
    let state = service_with(client, Some("sk-relay"));

    let (status, body) =
        generate(state, r#"{"prompt": "flowchart for login"}"#.to_owned()).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.0["error"], "OpenAI API error: 401");
}

#[tokio::test]
async fn embedded_upstream_error_becomes_bad_request() {
    let err = GenerationError::Remote {
        status: Some(200),
        message: "content filtered".to_owned(),
    };
    let client = Arc::new(ScriptedClient::new([Err(err)]));
    let state = service_with(client, Some("sk-relay"));

    let (status, body) =
        generate(state, r#"{"prompt": "flowchart for login"}"#.to_owned()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.0["error"], "content filtered");
}

#[tokio::test]
async fn malformed_upstream_reply_is_a_server_error() {
    let err = GenerationError::MalformedResponse { detail: "missing choices".to_owned() };
    let client = Arc::new(ScriptedClient::new([Err(err)]));
    let state = service_with(client, Some("sk-relay"));

    let (status, body) =
        generate(state, r#"{"prompt": "flowchart for login"}"#.to_owned()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.0["error"], "Unexpected response format from OpenAI API");
}

#[tokio::test]
async fn transport_failure_hides_the_detail() {
    let err = GenerationError::Transport { detail: "dns error: no such host".to_owned() };
    let client = Arc::new(ScriptedClient::new([Err(err)]));
    let state = service_with(client, Some("sk-relay"));

    let (status, body) =
        generate(state, r#"{"prompt": "flowchart for login"}"#.to_owned()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.0["error"], "Failed to generate diagram");
    assert!(!body.0["error"].to_string().contains("dns"));
}

#[tokio::test]
async fn upstream_timeout_maps_to_gateway_timeout() {
    let err = GenerationError::Timeout { limit: std::time::Duration::from_secs(60) };
    let client = Arc::new(ScriptedClient::new([Err(err)]));
    let state = service_with(client, Some("sk-relay"));

    let (status, body) =
        generate(state, r#"{"prompt": "flowchart for login"}"#.to_owned()).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body.0["error"], "OpenAI API request timed out");
}
