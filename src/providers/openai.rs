use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::retry::{Backoff, is_retryable, retry_after};
use super::{DEFAULT_BASE_URL, DEFAULT_MODEL, Provider, ProviderFuture};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 500;

/// Any OpenAI-compatible chat completions endpoint (DeepSeek by default).
#[derive(Debug, Clone)]
pub struct OpenAI {
    key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAI {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if !base_url.trim().is_empty() {
            self.base_url = base_url.trim_end_matches('/').to_string();
        }
        self
    }

    async fn call_chat_completions(&self, prompt: String) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS
        });

        let mut backoff = Backoff::new();
        loop {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.key)
                .timeout(REQUEST_TIMEOUT)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let retry_after = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            if status.is_success() {
                return extract_completion(&text);
            }
            if is_retryable(status) && backoff.wait(self.name(), retry_after).await {
                continue;
            }
            return Err(anyhow!(
                "{} API error ({}): {}",
                self.name(),
                status,
                extract_openai_error(&text).unwrap_or(text)
            ));
        }
    }
}

impl Provider for OpenAI {
    fn name(&self) -> &str {
        &self.model
    }

    fn complete<'a>(&'a self, prompt: String) -> ProviderFuture<'a> {
        Box::pin(self.call_chat_completions(prompt))
    }
}

fn extract_completion(text: &str) -> Result<String> {
    let payload: ChatResponse =
        serde_json::from_str(text).with_context(|| "failed to parse chat completion JSON")?;
    let content = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("no completion returned"))?;
    debug!("completion: {}", content);
    Ok(content.trim().to_string())
}

fn extract_openai_error(text: &str) -> Option<String> {
    let payload: ErrorResponse = serde_json::from_str(text).ok()?;
    let error = payload.error?;
    let mut parts = Vec::new();
    if let Some(message) = error.message {
        if !message.trim().is_empty() {
            parts.push(message);
        }
    }
    if let Some(kind) = error.kind {
        if !kind.trim().is_empty() {
            parts.push(format!("type: {}", kind));
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}
