//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use toolhub::index::Embedder;
use toolhub::tools::{FnTool, Tool};

/// Counts invocations of the tool it wraps.
pub struct Counter(pub Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self(Arc::new(AtomicUsize::new(0)))
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A(search web), B(read file), C(send email). B echoes its input.
pub fn abc_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        FnTool::new("A", "search web", |_| async { Ok(json!("web results")) }).shared(),
        FnTool::new("B", "read file", |input: Value| async move {
            let path = input["path"].as_str().unwrap_or("?").to_string();
            Ok(json!(format!("contents of {path}")))
        })
        .shared(),
        FnTool::new("C", "send email", |_| async { Ok(json!({"sent": true})) }).shared(),
    ]
}

/// A tool that returns `len` copies of `ch`.
pub fn big_output_tool(name: &str, ch: char, len: usize) -> Arc<dyn Tool> {
    FnTool::new(name, "returns a lot of text", move |_| async move {
        Ok(Value::String(std::iter::repeat(ch).take(len).collect()))
    })
    .shared()
}

/// A tool that counts how often it runs.
pub fn counting_tool(name: &str, counter: &Counter) -> Arc<dyn Tool> {
    let hits = Arc::clone(&counter.0);
    FnTool::new(name, "counts its invocations", move |_| {
        let hits = Arc::clone(&hits);
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(json!("ok"))
        }
    })
    .shared()
}

const VOCAB: &[&str] = &["web", "file", "email", "read", "search", "send"];

/// Deterministic embedder: one dimension per vocabulary word present.
/// Query embedding (a single input) fails while `fail_queries` is set.
pub struct KeywordEmbedder {
    pub fail_queries: AtomicBool,
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            fail_queries: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_id(&self) -> &str {
        "keyword-test"
    }

    async fn embed(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if texts.len() == 1 && self.fail_queries.load(Ordering::SeqCst) {
            anyhow::bail!("embedding service unavailable");
        }
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                VOCAB
                    .iter()
                    .map(|w| if lower.contains(w) { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect())
    }
}

pub fn names(v: &Value) -> Vec<String> {
    v.as_array()
        .map(|a| a.iter().filter_map(|s| s.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

use std::sync::Mutex;
use toolhub::models::{ChatMessage, ModelProvider, ProviderResponse, TokenUsage};

/// Replays a fixed list of responses, then answers `Final("done")`.
/// Every request's messages are kept for inspection.
pub struct ScriptedProvider {
    script: Vec<ProviderResponse>,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<ProviderResponse>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Messages sent on the `n`-th request.
    pub fn request(&self, n: usize) -> Vec<ChatMessage> {
        self.seen.lock().unwrap()[n].clone()
    }
}

pub fn hub_call(id: &str, args: Value) -> ProviderResponse {
    ProviderResponse::FunctionCall {
        id: id.to_string(),
        name: "tool_hub".to_string(),
        arguments: args.to_string(),
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn send_chat_with_functions(
        &self,
        messages: &[ChatMessage],
        functions: &[Value],
    ) -> Result<(ProviderResponse, Option<TokenUsage>), anyhow::Error> {
        assert_eq!(functions.len(), 1, "only tool_hub is exposed");
        self.seen.lock().unwrap().push(messages.to_vec());
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let resp = self
            .script
            .get(n)
            .cloned()
            .unwrap_or_else(|| ProviderResponse::Final("done".to_string()));
        let usage = TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        Ok((resp, Some(usage)))
    }
}

/// Always fails, like an unreachable model endpoint.
pub struct DownProvider;

#[async_trait]
impl ModelProvider for DownProvider {
    async fn send_chat_with_functions(
        &self,
        _messages: &[ChatMessage],
        _functions: &[Value],
    ) -> Result<(ProviderResponse, Option<TokenUsage>), anyhow::Error> {
        anyhow::bail!("connection refused")
    }
}
