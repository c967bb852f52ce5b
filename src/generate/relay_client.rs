// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{
    map_request_error, require_prompt, GenerationClient, GenerationError,
    DEFAULT_REQUEST_TIMEOUT,
};

/// Relay-call client: the credential lives server-side, so this client never
/// needs one and is always considered configured.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl RelayClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Decodes a relay reply: `{code}` on success, `{error}` on failure.
pub(super) fn decode_relay_reply(status: u16, body: &str) -> Result<String, GenerationError> {
    let ok = (200..300).contains(&status);

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) if !ok => {
            return Err(GenerationError::Remote {
                status: Some(status),
                message: format!("Relay error: {status}"),
            });
        }
        Err(err) => {
            return Err(GenerationError::MalformedResponse {
                detail: format!("relay reply is not JSON: {err}"),
            });
        }
    };

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(GenerationError::Remote { status: Some(status), message: error.to_owned() });
    }

    if !ok {
        return Err(GenerationError::Remote {
            status: Some(status),
            message: format!("Relay error: {status}"),
        });
    }

    let code = value.get("code").and_then(Value::as_str).ok_or_else(|| {
        GenerationError::MalformedResponse { detail: "missing code field".to_owned() }
    })?;

    Ok(code.trim().to_owned())
}

#[async_trait]
impl GenerationClient for RelayClient {
    async fn generate(
        &self,
        prompt: &str,
        _credential: Option<&str>,
    ) -> Result<String, GenerationError> {
        require_prompt(prompt)?;

        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "prompt": prompt }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| map_request_error(err, self.timeout))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| map_request_error(err, self.timeout))?;

        tracing::debug!(status, body_len = body.len(), "relay response");
        decode_relay_reply(status, &body)
    }

    fn requires_credential(&self) -> bool {
        false
    }
}
