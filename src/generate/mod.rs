// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

//! Generation clients.
//!
//! Two architectures are supported: direct calls against the OpenAI
//! chat-completions endpoint (the client holds the credential) and calls via
//! an undine relay that holds the credential server-side. Both sit behind
//! [`GenerationClient`]; response decoding is factored into pure helpers so
//! the error mapping is testable without a network.

mod openai;
mod relay_client;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

pub use openai::OpenAiClient;
pub use relay_client::RelayClient;

/// Fixed instruction constraining the model to emit raw Mermaid syntax.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that generates Mermaid diagram code based on user prompts. Only respond with valid Mermaid syntax without any explanations or markdown formatting.";

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The prompt was empty or whitespace-only; rejected before any network
    /// call.
    EmptyPrompt,
    /// Direct mode with no configured credential; rejected before any
    /// network call.
    MissingCredential,
    /// The remote service reported an error, either as a non-2xx status or
    /// as an embedded error field in the body.
    Remote { status: Option<u16>, message: String },
    /// A 2xx response that does not match the documented schema.
    MalformedResponse { detail: String },
    /// The request never produced a usable response (DNS, connect, TLS...).
    Transport { detail: String },
    /// The bounded wait on the request elapsed.
    Timeout { limit: Duration },
}

impl GenerationError {
    /// Short user-readable reason for notices. Raw detail stays in the log.
    pub fn user_reason(&self) -> String {
        match self {
            Self::EmptyPrompt => "Prompt must not be empty.".to_owned(),
            Self::MissingCredential => {
                "Please add your OpenAI API key in settings first.".to_owned()
            }
            Self::Remote { message, .. } => message.clone(),
            Self::MalformedResponse { .. } => {
                "Unexpected response format from the generation service.".to_owned()
            }
            Self::Transport { .. } => {
                "Failed to generate diagram. Please try again.".to_owned()
            }
            Self::Timeout { .. } => "The generation request timed out.".to_owned(),
        }
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPrompt => write!(f, "prompt is empty"),
            Self::MissingCredential => write!(f, "no credential configured"),
            Self::Remote { status: Some(status), message } => {
                write!(f, "remote error (status {status}): {message}")
            }
            Self::Remote { status: None, message } => write!(f, "remote error: {message}"),
            Self::MalformedResponse { detail } => write!(f, "malformed response: {detail}"),
            Self::Transport { detail } => write!(f, "transport error: {detail}"),
            Self::Timeout { limit } => write!(f, "request timed out after {limit:?}"),
        }
    }
}

impl std::error::Error for GenerationError {}

/// A client that turns a natural-language prompt into Mermaid source.
///
/// Calls are not cancellable; callers discard stale outcomes by sequence
/// token instead (see the render pipeline for the same rule).
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generates diagram source for `prompt`. `credential` is the
    /// user-held key in direct mode; relay-backed clients ignore it.
    async fn generate(
        &self,
        prompt: &str,
        credential: Option<&str>,
    ) -> Result<String, GenerationError>;

    /// Whether this client needs a user-held credential before it can be
    /// used. Relay-backed clients return false.
    fn requires_credential(&self) -> bool;
}

fn require_prompt(prompt: &str) -> Result<(), GenerationError> {
    if prompt.trim().is_empty() {
        return Err(GenerationError::EmptyPrompt);
    }
    Ok(())
}

/// Builds the chat-completions request body.
pub fn chat_completion_body(model: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": prompt },
        ],
        "temperature": 0.7,
    })
}

/// Decodes a chat-completions response into diagram source.
///
/// An embedded `error.message` wins over everything else, matching the
/// upstream API which reports errors in otherwise-2xx bodies too. The
/// completion text is trimmed of surrounding whitespace.
pub fn decode_chat_completion(status: u16, body: &str) -> Result<String, GenerationError> {
    let ok = (200..300).contains(&status);

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) if !ok => {
            return Err(GenerationError::Remote {
                status: Some(status),
                message: format!("OpenAI API error: {status}"),
            });
        }
        Err(err) => {
            return Err(GenerationError::MalformedResponse {
                detail: format!("response body is not JSON: {err}"),
            });
        }
    };

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| "Error generating diagram".to_owned());
        return Err(GenerationError::Remote { status: Some(status), message });
    }

    if !ok {
        return Err(GenerationError::Remote {
            status: Some(status),
            message: format!("OpenAI API error: {status}"),
        });
    }

    let content = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| GenerationError::MalformedResponse {
            detail: "missing choices[0].message.content".to_owned(),
        })?;

    Ok(content.trim().to_owned())
}

fn map_request_error(err: reqwest::Error, limit: Duration) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout { limit }
    } else {
        GenerationError::Transport { detail: err.to_string() }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{GenerationClient, GenerationError};

    /// Test double that replays scripted outcomes and counts calls.
    pub(crate) struct ScriptedClient {
        outcomes: Mutex<VecDeque<Result<String, GenerationError>>>,
        calls: AtomicUsize,
        requires_credential: bool,
    }

    impl ScriptedClient {
        pub(crate) fn new(
            outcomes: impl IntoIterator<Item = Result<String, GenerationError>>,
        ) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into_iter().collect()),
                calls: AtomicUsize::new(0),
                requires_credential: false,
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationClient for ScriptedClient {
        async fn generate(
            &self,
            prompt: &str,
            _credential: Option<&str>,
        ) -> Result<String, GenerationError> {
            super::require_prompt(prompt)?;
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes.lock().expect("outcomes lock").pop_front().unwrap_or_else(|| {
                Err(GenerationError::Transport { detail: "no scripted outcome".to_owned() })
            })
        }

        fn requires_credential(&self) -> bool {
            self.requires_credential
        }
    }
}
