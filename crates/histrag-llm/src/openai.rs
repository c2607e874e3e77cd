//! OpenAI-compatible chat completions over `reqwest`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use histrag_core::config::GenerationSettings;
use histrag_core::error::{Error, Result};
use histrag_core::traits::LanguageModel;

pub struct OpenAiChatModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::InvalidConfig("API key must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            model: model.into(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            temperature: 0.0,
        })
    }

    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        let model = Self::new(
            settings.resolve_api_key()?,
            settings.model.clone(),
            &settings.base_url,
            Duration::from_secs(settings.timeout_secs),
        )?;
        Ok(model.with_temperature(settings.temperature))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_len = prompt.len(), "chat completion request");
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(model = %self.model, error = %e, "request failed");
                Error::generation(format!("request failed: {e}"), e.is_timeout() || e.is_connect())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
            error!(model = %self.model, %status, "API error");
            return Err(Error::generation(format!("API returned {status}: {detail}"), retryable_status(status)));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(model = %self.model, error = %e, "failed to parse response");
            Error::generation(format!("failed to parse response: {e}"), false)
        })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::generation("response contained no message content", false))
    }
}
