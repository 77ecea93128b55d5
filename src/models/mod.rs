//! Model provider abstractions.
//!
//! Defines the [`ModelProvider`] trait, the [`ChatMessage`] type, the
//! function-calling aware [`ProviderResponse`], and the OpenAI-compatible
//! [`OpenAIProvider`] used by the agent loop.

pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ModelConfig;

pub use openai::OpenAIProvider;

// ---------------------------------------------------------------------------
// ChatMessage – shared message representation
// ---------------------------------------------------------------------------

/// A single chat message with a role and content.
///
/// Optionally carries OpenAI tool-calling metadata so that `tool` role
/// messages and assistant `tool_calls` responses are serialised
/// correctly for the API.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    /// For assistant messages that invoke tools: the raw OpenAI-format
    /// `tool_calls` array.
    pub tool_calls: Option<Vec<serde_json::Value>>,
    /// For `role: "tool"` messages: the id of the tool call this result
    /// corresponds to.
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Convenience constructor for a plain message (no tool metadata).
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// A `role: "tool"` message answering the call `id`.
    pub fn tool_result(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".into(),
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(id.into()),
        }
    }
}

/// Serialise a slice of [`ChatMessage`]s into the OpenAI-compatible JSON
/// array format, including `tool_calls` and `tool_call_id` when present.
pub fn serialize_messages(messages: &[ChatMessage]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|m| {
            let mut msg = serde_json::json!({ "role": m.role });
            if let Some(ref tcs) = m.tool_calls {
                msg["tool_calls"] = serde_json::json!(tcs);
                // OpenAI expects content to be null on assistant messages
                // that carry tool_calls.
                if m.content.is_empty() {
                    msg["content"] = serde_json::Value::Null;
                } else {
                    msg["content"] = serde_json::json!(m.content);
                }
            } else {
                msg["content"] = serde_json::json!(m.content);
            }
            if let Some(ref tcid) = m.tool_call_id {
                msg["tool_call_id"] = serde_json::json!(tcid);
            }
            msg
        })
        .collect()
}

// ---------------------------------------------------------------------------
// ModelProvider trait
// ---------------------------------------------------------------------------

/// Trait implemented by every LLM backend.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Send chat messages with an array of function definitions.
    ///
    /// Returns either the model's final reply or the function calls it
    /// wants made, plus token usage when the backend reports it.
    async fn send_chat_with_functions(
        &self,
        messages: &[ChatMessage],
        functions: &[serde_json::Value],
    ) -> Result<(ProviderResponse, Option<TokenUsage>), anyhow::Error>;
}

// ---------------------------------------------------------------------------
// ProviderResponse – function-calling aware response
// ---------------------------------------------------------------------------

/// Token usage statistics returned by the API.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A single function call within a multi-call response.
#[derive(Debug, Clone)]
pub struct FunctionCallItem {
    /// Tool call id (from the API).
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Response from a model that may be a final text reply or a function call.
#[derive(Debug, Clone)]
pub enum ProviderResponse {
    /// Plain text reply from the model.
    Final(String),
    /// The model wants to invoke a single function.
    FunctionCall {
        /// Tool-call id assigned by the API.
        id: String,
        name: String,
        arguments: String,
    },
    /// The model wants to invoke multiple functions in parallel.
    MultiFunctionCall(Vec<FunctionCallItem>),
}

impl ProviderResponse {
    /// Flatten into a list of calls; empty for a final reply.
    pub fn into_calls(self) -> Vec<FunctionCallItem> {
        match self {
            ProviderResponse::Final(_) => Vec::new(),
            ProviderResponse::FunctionCall { id, name, arguments } => {
                vec![FunctionCallItem { id, name, arguments }]
            }
            ProviderResponse::MultiFunctionCall(items) => items,
        }
    }
}

/// Extract token usage statistics from an OpenAI-style response JSON.
pub fn parse_token_usage(json: &serde_json::Value) -> Option<TokenUsage> {
    let usage = json.get("usage")?;
    Some(TokenUsage {
        prompt_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0),
        completion_tokens: usage["completion_tokens"].as_u64().unwrap_or(0),
        total_tokens: usage["total_tokens"].as_u64().unwrap_or(0),
    })
}

/// Parse `tool_calls` from an OpenAI-style chat completion response.
///
/// A single tool call returns `FunctionCall`; several return
/// `MultiFunctionCall`. Falls back to the legacy `function_call` field.
pub fn parse_tool_calls(json: &serde_json::Value) -> Option<ProviderResponse> {
    let message = json.get("choices")?.get(0)?.get("message")?;

    if let Some(tool_calls) = message.get("tool_calls").and_then(|v| v.as_array()) {
        let mut items: Vec<FunctionCallItem> = tool_calls
            .iter()
            .filter_map(|tc| {
                let func = tc.get("function")?;
                let name = func.get("name")?.as_str()?.to_string();
                let arguments = func
                    .get("arguments")
                    .and_then(|a| a.as_str())
                    .unwrap_or("{}")
                    .to_string();
                let id = tc
                    .get("id")
                    .and_then(|i| i.as_str())
                    .unwrap_or("")
                    .to_string();
                Some(FunctionCallItem { id, name, arguments })
            })
            .collect();

        if items.len() > 1 {
            return Some(ProviderResponse::MultiFunctionCall(items));
        }
        if let Some(item) = items.pop() {
            return Some(ProviderResponse::FunctionCall {
                id: item.id,
                name: item.name,
                arguments: item.arguments,
            });
        }
    }

    // Legacy `function_call` field.
    if let Some(fc) = message.get("function_call").and_then(|v| v.as_object()) {
        let name = fc
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let arguments = fc
            .get("arguments")
            .and_then(|v| v.as_str())
            .unwrap_or("{}")
            .to_string();
        return Some(ProviderResponse::FunctionCall {
            id: String::new(),
            name,
            arguments,
        });
    }

    None
}

// ---------------------------------------------------------------------------
// Provider factory
// ---------------------------------------------------------------------------

/// Build the chat provider described by `cfg`.
pub fn build_provider(cfg: &ModelConfig) -> anyhow::Result<Arc<dyn ModelProvider>> {
    match cfg.provider.as_str() {
        "openai" => {
            let api_key = resolve_config_key(cfg.api_key.as_deref(), &cfg.provider);
            if api_key.is_empty() {
                tracing::warn!(
                    provider = %cfg.provider,
                    "no API key configured, requests will be sent unauthenticated"
                );
            }
            let endpoint = cfg
                .endpoint
                .clone()
                .unwrap_or_else(|| openai::DEFAULT_ENDPOINT.to_string());
            let provider = OpenAIProvider::with_config(api_key, endpoint, cfg.model.clone())?;
            Ok(Arc::new(provider))
        }
        other => anyhow::bail!("unsupported model provider '{other}'"),
    }
}

/// Resolve an API key: config value → env var → empty string.
///
/// If the config value starts with `$`, it's treated as an env-var
/// reference.
fn resolve_config_key(config_key: Option<&str>, provider_id: &str) -> String {
    if let Some(k) = config_key {
        if k.starts_with('$') {
            return crate::utils::resolve_env_ref(k);
        }
        if !k.is_empty() {
            return k.to_string();
        }
    }
    // Fallback: PROVIDER_API_KEY env var.
    let env_name = format!("{}_API_KEY", provider_id.to_uppercase().replace('-', "_"));
    std::env::var(env_name).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolve_config_key_plain_value() {
        assert_eq!(resolve_config_key(Some("my-secret"), "test"), "my-secret");
    }

    #[test]
    fn resolve_config_key_env_var_syntax() {
        std::env::set_var("TOOLHUB_TEST_RESOLVE_KEY_1", "from_env");
        assert_eq!(
            resolve_config_key(Some("$TOOLHUB_TEST_RESOLVE_KEY_1"), "test"),
            "from_env"
        );
        std::env::remove_var("TOOLHUB_TEST_RESOLVE_KEY_1");
    }

    #[test]
    fn resolve_config_key_fallback_env() {
        std::env::set_var("TOOLHUBTEST_API_KEY", "fallback");
        assert_eq!(resolve_config_key(None, "toolhubtest"), "fallback");
        std::env::remove_var("TOOLHUBTEST_API_KEY");
    }

    #[test]
    fn unsupported_provider_is_rejected() {
        let cfg = ModelConfig {
            provider: "copilot".into(),
            model: "gpt-4o".into(),
            endpoint: None,
            api_key: None,
        };
        assert!(build_provider(&cfg).is_err());
    }

    #[test]
    fn serialize_tool_messages() {
        let mut assistant = ChatMessage::new("assistant", "");
        assistant.tool_calls = Some(vec![json!({"id": "c1"})]);
        let out = serialize_messages(&[assistant, ChatMessage::tool_result("c1", "{}")]);
        assert!(out[0]["content"].is_null());
        assert_eq!(out[0]["tool_calls"][0]["id"], "c1");
        assert_eq!(out[1]["role"], "tool");
        assert_eq!(out[1]["tool_call_id"], "c1");
    }

    #[test]
    fn parse_single_tool_call() {
        let resp = json!({"choices": [{"message": {"tool_calls": [{
            "id": "call_1",
            "type": "function",
            "function": {"name": "tool_hub", "arguments": "{\"action\":\"search\"}"}
        }]}}]});
        match parse_tool_calls(&resp) {
            Some(ProviderResponse::FunctionCall { id, name, arguments }) => {
                assert_eq!(id, "call_1");
                assert_eq!(name, "tool_hub");
                assert!(arguments.contains("search"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_multiple_tool_calls() {
        let resp = json!({"choices": [{"message": {"tool_calls": [
            {"id": "a", "function": {"name": "tool_hub", "arguments": "{}"}},
            {"id": "b", "function": {"name": "tool_hub", "arguments": "{}"}}
        ]}}]});
        let calls = parse_tool_calls(&resp).unwrap().into_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].id, "b");
    }

    #[test]
    fn parse_legacy_function_call() {
        let resp = json!({"choices": [{"message": {"function_call": {
            "name": "tool_hub", "arguments": "{}"
        }}}]});
        let calls = parse_tool_calls(&resp).unwrap().into_calls();
        assert_eq!(calls[0].name, "tool_hub");
        assert_eq!(calls[0].id, "");
    }

    #[test]
    fn plain_reply_has_no_tool_calls() {
        let resp = json!({"choices": [{"message": {"content": "hi"}}]});
        assert!(parse_tool_calls(&resp).is_none());
    }

    #[test]
    fn usage_is_parsed() {
        let u = parse_token_usage(&json!({"usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7}})).unwrap();
        assert_eq!(u.total_tokens, 7);
    }
}
