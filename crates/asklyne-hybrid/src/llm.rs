//! HTTP completion client for Together-style inference endpoints.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use asklyne_core::config::CompletionSettings;
use asklyne_core::traits::Completion;

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

pub struct InferenceClient {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl InferenceClient {
    pub fn new(settings: &CompletionSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(settings.timeout_secs)).build()?;
        Ok(Self {
            http,
            api_url: settings.api_url.clone(),
            api_key: settings.api_key.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        })
    }
}

/// Pull the generated text out of either response shape the endpoint uses.
pub fn extract_text(body: &Value) -> anyhow::Result<String> {
    let text = body
        .pointer("/output/choices/0/text")
        .or_else(|| body.pointer("/choices/0/message/content"))
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("unexpected completion response shape"))?;
    Ok(text.to_string())
}

#[async_trait]
impl Completion for InferenceClient {
    async fn complete(&self, prompt: &str, model_id: &str) -> anyhow::Result<String> {
        let request = InferenceRequest {
            model: model_id,
            messages: [
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: prompt },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        let mut builder = self.http.post(&self.api_url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?.error_for_status()?;
        let body: Value = response.json().await?;
        debug!(model = model_id, "completion received");
        extract_text(&body)
    }
}
