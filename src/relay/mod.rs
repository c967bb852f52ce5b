// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

//! Relay service.
//!
//! A small axum app exposing `POST /generate`. Clients send `{"prompt"}` and
//! never see the OpenAI credential; the relay holds it and forwards the
//! prompt upstream. Replies are `{"code"}` on success and `{"error"}`
//! otherwise, with upstream non-2xx statuses passed through.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::generate::{GenerationClient, GenerationError};

const PROMPT_REQUIRED: &str = "Prompt is required and must be a string";
const KEY_NOT_CONFIGURED: &str = "OpenAI API key not configured";
const UNEXPECTED_FORMAT: &str = "Unexpected response format from OpenAI API";
const GENERATION_FAILED: &str = "Failed to generate diagram";
const UPSTREAM_TIMEOUT: &str = "OpenAI API request timed out";

/// Shared state of the relay: the upstream client and the server-held
/// credential.
pub struct RelayService {
    backend: Arc<dyn GenerationClient>,
    api_key: Option<String>,
}

impl RelayService {
    pub fn new(backend: Arc<dyn GenerationClient>, api_key: Option<String>) -> Self {
        Self { backend, api_key: api_key.filter(|key| !key.is_empty()) }
    }
}

/// Builds the relay router. CORS is permissive; the relay is meant to sit
/// in front of arbitrary clients.
pub fn router(service: Arc<RelayService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/generate", post(generate))
        .layer(cors)
        .with_state(service)
}

/// `POST /generate` handler. The body is parsed by hand so malformed JSON
/// and a missing prompt produce the same 400 reply.
async fn generate(
    State(service): State<Arc<RelayService>>,
    body: String,
) -> (StatusCode, Json<Value>) {
    let prompt = serde_json::from_str::<Value>(&body)
        .ok()
        .as_ref()
        .and_then(|value| value.get("prompt"))
        .and_then(Value::as_str)
        .map(str::to_owned);

    let Some(prompt) = prompt.filter(|prompt| !prompt.trim().is_empty()) else {
        return reply_error(StatusCode::BAD_REQUEST, PROMPT_REQUIRED);
    };

    let Some(api_key) = service.api_key.as_deref() else {
        tracing::error!("generation request refused: no credential configured");
        return reply_error(StatusCode::INTERNAL_SERVER_ERROR, KEY_NOT_CONFIGURED);
    };

    match service.backend.generate(&prompt, Some(api_key)).await {
        Ok(code) => (StatusCode::OK, Json(json!({ "code": code }))),
        Err(err) => {
            tracing::warn!(error = %err, "upstream generation failed");
            map_generation_error(err)
        }
    }
}

fn map_generation_error(err: GenerationError) -> (StatusCode, Json<Value>) {
    match err {
        // An error embedded in a 2xx upstream body is the caller's problem
        // (bad prompt, quota) and keeps its message. Non-2xx replies pass
        // their status through with a generic text; the upstream message
        // stays in the log.
        GenerationError::Remote { status: Some(status), message } => {
            if (200..300).contains(&status) {
                reply_error(StatusCode::BAD_REQUEST, &message)
            } else {
                let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                reply_error(code, &format!("OpenAI API error: {status}"))
            }
        }
        GenerationError::Remote { status: None, message } => {
            reply_error(StatusCode::BAD_GATEWAY, &message)
        }
        GenerationError::MalformedResponse { .. } => {
            reply_error(StatusCode::INTERNAL_SERVER_ERROR, UNEXPECTED_FORMAT)
        }
        GenerationError::Timeout { .. } => {
            reply_error(StatusCode::GATEWAY_TIMEOUT, UPSTREAM_TIMEOUT)
        }
        GenerationError::EmptyPrompt => reply_error(StatusCode::BAD_REQUEST, PROMPT_REQUIRED),
        GenerationError::MissingCredential => {
            reply_error(StatusCode::INTERNAL_SERVER_ERROR, KEY_NOT_CONFIGURED)
        }
        GenerationError::Transport { .. } => {
            reply_error(StatusCode::INTERNAL_SERVER_ERROR, GENERATION_FAILED)
        }
    }
}

fn reply_error(code: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (code, Json(json!({ "error": message })))
}

#[cfg(test)]
mod tests;
