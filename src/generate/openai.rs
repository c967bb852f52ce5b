// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

use std::time::Duration;

use async_trait::async_trait;

use super::{
    chat_completion_body, decode_chat_completion, map_request_error, require_prompt,
    GenerationClient, GenerationError, DEFAULT_MODEL, DEFAULT_OPENAI_BASE_URL,
    DEFAULT_REQUEST_TIMEOUT,
};

/// Direct-call client: holds no credential itself, the caller passes the
/// user's key per request. Fails fast when the key is absent.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    async fn generate(
        &self,
        prompt: &str,
        credential: Option<&str>,
    ) -> Result<String, GenerationError> {
        require_prompt(prompt)?;
        let Some(credential) = credential.filter(|key| !key.is_empty()) else {
            return Err(GenerationError::MissingCredential);
        };

        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(credential)
            .json(&chat_completion_body(&self.model, prompt))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| map_request_error(err, self.timeout))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| map_request_error(err, self.timeout))?;

        tracing::debug!(status, body_len = body.len(), "chat completion response");
        decode_chat_completion(status, &body)
    }

    fn requires_credential(&self) -> bool {
        true
    }
}
