//! Tool capability interface.
//!
//! Every tool the hub can surface implements [`Tool`]: a name, a
//! one-line description used for retrieval, and an async `invoke`.
//! Tools are stored as `Arc<dyn Tool>` in the [`ToolRegistry`] and
//! shared (never copied) with the active set and the retrieval index.
//!
//! Two concrete tool types ship with the crate:
//! - [`FnTool`] wraps an async closure (library embedding, tests);
//! - [`CommandTool`] runs an external program declared in a YAML
//!   manifest (see [`manifest`]).

pub mod command;
pub mod manifest;
pub mod registry;

pub use command::CommandTool;
pub use registry::ToolRegistry;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

// ── Capability trait ─────────────────────────────────────────

/// Trait implemented by every tool reachable through the hub.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique, non-empty machine name (e.g. `"read_file"`).
    fn name(&self) -> &str;

    /// Human-readable description. Used by both the semantic index
    /// and the lexical fallback scorer.
    fn description(&self) -> &str;

    /// Invoke the tool once.
    ///
    /// `input` is whatever the model supplied as `tool_input`: parsed
    /// JSON when it parsed, otherwise the raw text as a JSON string.
    async fn invoke(&self, input: Value) -> anyhow::Result<Value>;
}

/// Serializable name/description pair, used for listings.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ToolMeta {
    pub name: String,
    pub description: String,
}

impl ToolMeta {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
        }
    }
}

// ── Closure-backed tool ──────────────────────────────────────

/// Async handler signature accepted by [`FnTool`].
pub type ToolHandler = Arc<
    dyn Fn(Value) -> Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>> + Send + Sync,
>;

/// A tool whose behaviour is an async closure.
pub struct FnTool {
    name: String,
    description: String,
    handler: ToolHandler,
}

impl FnTool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let handler: ToolHandler = Arc::new(
            move |input: Value| -> Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>> {
                Box::pin(f(input))
            },
        );
        Self {
            name: name.into(),
            description: description.into(),
            handler,
        }
    }

    /// Convenience: wrap into the `Arc<dyn Tool>` the registry expects.
    pub fn shared(self) -> Arc<dyn Tool> {
        Arc::new(self)
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, input: Value) -> anyhow::Result<Value> {
        (self.handler)(input).await
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool").field("name", &self.name).finish()
    }
}

// ── Input / output shaping ───────────────────────────────────

/// Best-effort parse of a model-supplied `tool_input`.
///
/// Empty input and anything that is not valid JSON are passed through
/// unchanged as a JSON string.
pub fn parse_tool_input(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Render a tool result as text: strings verbatim, everything else as
/// compact JSON.
pub fn stringify_result(result: &Value) -> String {
    match result {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_tool_input_accepts_json_object() {
        assert_eq!(parse_tool_input(r#"{"path":"/tmp/x"}"#), json!({"path": "/tmp/x"}));
    }

    #[test]
    fn parse_tool_input_passes_raw_text_through() {
        assert_eq!(parse_tool_input("not json {"), json!("not json {"));
        assert_eq!(parse_tool_input(""), json!(""));
    }

    #[test]
    fn parse_tool_input_accepts_scalars() {
        assert_eq!(parse_tool_input("42"), json!(42));
        assert_eq!(parse_tool_input("\"quoted\""), json!("quoted"));
    }

    #[test]
    fn stringify_keeps_strings_verbatim() {
        assert_eq!(stringify_result(&json!("hello \"world\"")), "hello \"world\"");
    }

    #[test]
    fn stringify_serializes_structured_values() {
        assert_eq!(stringify_result(&json!({"a": [1, 2]})), r#"{"a":[1,2]}"#);
        assert_eq!(stringify_result(&json!(7)), "7");
        assert_eq!(stringify_result(&Value::Null), "null");
    }

    #[tokio::test]
    async fn fn_tool_invokes_closure() {
        let tool = FnTool::new("echo", "Echo the input back", |input| async move { Ok(input) });
        assert_eq!(tool.name(), "echo");
        let out = tool.invoke(json!({"x": 1})).await.unwrap();
        assert_eq!(out, json!({"x": 1}));
    }

    #[test]
    fn tool_meta_of_copies_fields() {
        let tool = FnTool::new("t", "desc", |_| async { Ok(Value::Null) });
        assert_eq!(
            ToolMeta::of(&tool),
            ToolMeta {
                name: "t".into(),
                description: "desc".into()
            }
        );
    }
}
