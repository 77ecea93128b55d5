//! OpenAI chat-completions provider.
//!
//! Works against any endpoint speaking the OpenAI chat completions
//! protocol (OpenAI, Azure-style gateways, Ollama, vLLM, LM Studio).

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{ChatMessage, ModelProvider, ProviderResponse, TokenUsage};

/// Default endpoint for OpenAI chat completions.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Provider that talks to the OpenAI-compatible chat completions API.
pub struct OpenAIProvider {
    api_key: String,
    endpoint: String,
    client: Client,
    /// Model name sent in the request body (e.g. "gpt-4o-mini").
    model: String,
}

impl OpenAIProvider {
    /// Create a provider with explicit configuration. An empty `api_key`
    /// sends no `Authorization` header (local servers).
    pub fn with_config(api_key: String, endpoint: String, model: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            api_key,
            endpoint,
            client,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post(&self, body: &serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let mut req = self.client.post(&self.endpoint).json(body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        let resp = req.send().await.context("chat completions request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API returned {status}: {text}");
        }

        Ok(resp.json().await?)
    }
}

fn first_content(json: &serde_json::Value) -> String {
    json["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string()
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    /// Send chat messages with function definitions, exposed to the API
    /// as `tools` of type `function`.
    ///
    /// Returns [`ProviderResponse::FunctionCall`] when the model wants to
    /// invoke a tool, or [`ProviderResponse::Final`] for a normal reply.
    async fn send_chat_with_functions(
        &self,
        messages: &[ChatMessage],
        functions: &[serde_json::Value],
    ) -> Result<(ProviderResponse, Option<TokenUsage>), anyhow::Error> {
        let mut body = json!({
            "model": self.model,
            "messages": super::serialize_messages(messages),
        });

        if !functions.is_empty() {
            let tools: Vec<serde_json::Value> = functions
                .iter()
                .map(|f| json!({"type": "function", "function": f}))
                .collect();
            body["tools"] = serde_json::Value::Array(tools);
            body["tool_choice"] = json!("auto");
        }

        let json = self.post(&body).await?;
        let usage = super::parse_token_usage(&json);

        if let Some(pr) = super::parse_tool_calls(&json) {
            return Ok((pr, usage));
        }

        Ok((ProviderResponse::Final(first_content(&json)), usage))
    }
}
