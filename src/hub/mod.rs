//! The `tool_hub` dispatcher.
//!
//! The model sees exactly one function. A `search` retrieves candidate
//! tools (semantic index first, substring scorer as fallback) and adds
//! them to the per-query [`ActiveSet`]; a `call` invokes a registered
//! tool by exact name. Every outcome, including errors, is returned to
//! the model as a JSON object string so a malformed tool call never
//! aborts the agent loop.

pub mod active;
pub mod request;

pub use active::ActiveSet;
pub use request::{clamp_k, HubRequest, MAX_K, MIN_K};

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::HubSettings;
use crate::error::HubError;
use crate::index::{Embedder, RetrievalIndex};
use crate::lexical;
use crate::tools::{parse_tool_input, stringify_result, Tool, ToolRegistry};
use crate::usage::{NoopUsageLog, UsageLog};
use crate::utils::{truncate_chars, truncate_str};
use request::Route;

/// Name under which the hub is exposed to the model.
pub const HUB_FUNCTION_NAME: &str = "tool_hub";

const HUB_DESCRIPTION: &str = "\
IMPORTANT: This is the ONLY tool you can call directly. All other tools must be \
accessed through tool_hub.

To complete any task:
1. FIRST search for relevant tools: action='search', query='description of what you need', k=8
2. THEN call the found tools: action='call', tool_name='exact_tool_name', \
tool_input='{\"param\": \"value\"}'

The search will return a list of available tools. You must then call each tool \
using action='call'.";

/// Dispatcher state shared by every query of a session.
pub struct Hub {
    registry: Arc<ToolRegistry>,
    index: Arc<RetrievalIndex>,
    default_search_k: usize,
    max_result_chars: usize,
    usage: Arc<dyn UsageLog>,
}

impl Hub {
    pub fn new(registry: Arc<ToolRegistry>, index: Arc<RetrievalIndex>, settings: &HubSettings) -> Self {
        Self {
            registry,
            index,
            default_search_k: settings.default_search_k,
            max_result_chars: settings.max_result_chars,
            usage: Arc::new(NoopUsageLog),
        }
    }

    /// Build the registry and retrieval index for `tools` and wrap them
    /// in a hub. Fails only on invalid tool names.
    pub async fn build(
        tools: Vec<Arc<dyn Tool>>,
        embedder: Option<Arc<dyn Embedder>>,
        settings: &HubSettings,
    ) -> Result<Self, HubError> {
        let registry = Arc::new(ToolRegistry::new(tools)?);
        let index =
            RetrievalIndex::build(registry.tools(), embedder, &settings.index_options()).await;
        info!(tools = registry.len(), index = ?index.status(), "hub ready");
        Ok(Self::new(registry, Arc::new(index), settings))
    }

    pub fn with_usage_log(mut self, usage: Arc<dyn UsageLog>) -> Self {
        self.usage = usage;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn index(&self) -> &RetrievalIndex {
        &self.index
    }

    /// OpenAI-style function definition for `tool_hub`.
    pub fn function_definition() -> Value {
        serde_json::json!({
            "name": HUB_FUNCTION_NAME,
            "description": HUB_DESCRIPTION,
            "parameters": {
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["search", "call"],
                        "description": "'search' to find tools, 'call' to invoke one"
                    },
                    "query": {
                        "type": "string",
                        "description": "What you need a tool for (search only)"
                    },
                    "k": {
                        "type": "integer",
                        "minimum": MIN_K,
                        "maximum": MAX_K,
                        "description": "How many tools to fetch (search only)"
                    },
                    "tool_name": {
                        "type": "string",
                        "description": "Exact name of the tool to call (call only)"
                    },
                    "tool_input": {
                        "type": "string",
                        "description": "JSON-encoded arguments for the tool (call only)"
                    }
                },
                "required": ["action"]
            }
        })
    }

    /// Parse raw function-call arguments and dispatch them.
    pub async fn handle_json(&self, active: &mut ActiveSet, arguments: &str) -> String {
        let raw = if arguments.trim().is_empty() { "{}" } else { arguments };
        match serde_json::from_str::<HubRequest>(raw) {
            Ok(req) => self.handle(active, req).await,
            Err(e) => {
                warn!(error = %e, args = %truncate_str(arguments, 200), "unparsable tool_hub arguments");
                request::invalid_action()
            }
        }
    }

    /// Dispatch a single hub request. Always returns a JSON object string.
    pub async fn handle(&self, active: &mut ActiveSet, req: HubRequest) -> String {
        match req.route() {
            Route::Search => {
                let limit = clamp_k(req.k.as_ref(), self.default_search_k);
                self.search(active, &req.query, limit).await
            }
            Route::Call => self.call(active, &req.tool_name, &req.tool_input).await,
            Route::Invalid => {
                debug!(action = %req.action, "invalid tool_hub action");
                request::invalid_action()
            }
        }
    }

    async fn search(&self, active: &mut ActiveSet, query: &str, limit: usize) -> String {
        let matches = self.retrieve(query, limit).await;
        let added = active.merge(&matches);
        info!(
            query = %truncate_str(query, 120),
            k = limit,
            matched = matches.len(),
            added = added.len(),
            "tool_hub search"
        );
        request::search_response(&added, &active.snapshot())
    }

    /// Semantic results when the index produces any, substring ranking
    /// otherwise.
    async fn retrieve(&self, query: &str, limit: usize) -> Vec<Arc<dyn Tool>> {
        if self.registry.is_empty() {
            return Vec::new();
        }
        if self.index.status().is_queryable() {
            let resolved: Vec<Arc<dyn Tool>> = self
                .index
                .search(query, limit)
                .await
                .iter()
                .filter_map(|name| self.registry.get(name).cloned())
                .take(limit)
                .collect();
            if !resolved.is_empty() {
                return resolved;
            }
            debug!("vector search returned nothing, using substring search");
        }
        lexical::rank(self.registry.tools(), query, limit)
    }

    async fn call(&self, active: &mut ActiveSet, name: &str, raw_input: &str) -> String {
        let Some(tool) = self.registry.get(name).cloned() else {
            info!(tool = %name, "tool_hub call: unknown tool");
            return request::tool_not_found(name);
        };

        let input = parse_tool_input(raw_input);
        active.register(&tool);
        if let Err(e) = self.usage.record(tool.name()).await {
            warn!(tool = %tool.name(), error = %format!("{e:#}"), "usage log write failed");
        }

        let start = std::time::Instant::now();
        match tool.invoke(input).await {
            Ok(value) => {
                let text = stringify_result(&value);
                info!(
                    tool = %tool.name(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    chars = text.chars().count(),
                    "tool_hub call ok"
                );
                request::call_result(tool.name(), &truncate_chars(&text, self.max_result_chars))
            }
            Err(e) => {
                warn!(
                    tool = %tool.name(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %format!("{e:#}"),
                    "tool_hub call failed"
                );
                request::call_error(tool.name(), &format!("{e:#}"))
            }
        }
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("tools", &self.registry.len())
            .field("index", &self.index.status())
            .field("default_search_k", &self.default_search_k)
            .field("max_result_chars", &self.max_result_chars)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::FnTool;
    use serde_json::json;

    fn hub_with(tools: Vec<Arc<dyn Tool>>) -> Hub {
        let registry = Arc::new(ToolRegistry::new(tools).unwrap());
        Hub::new(registry, Arc::new(RetrievalIndex::absent()), &HubSettings::default())
    }

    fn parse(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn empty_registry_search_is_empty() {
        let hub = hub_with(vec![]);
        let mut active = ActiveSet::new();
        let out = parse(&hub.handle(&mut active, HubRequest::search("x", None)).await);
        assert_eq!(out, json!({"mode": "search", "fetched": [], "active": []}));
    }

    #[tokio::test]
    async fn unparsable_arguments_are_invalid_action() {
        let hub = hub_with(vec![]);
        let mut active = ActiveSet::new();
        let out = parse(&hub.handle_json(&mut active, "{not json").await);
        assert_eq!(out, json!({"error": "invalid action; use 'search' or 'call'"}));
        let out = parse(&hub.handle_json(&mut active, "").await);
        assert_eq!(out["error"], "invalid action; use 'search' or 'call'");
    }

    #[tokio::test]
    async fn failing_tool_reports_error_and_stays_active() {
        let hub = hub_with(vec![FnTool::new("boom", "always fails", |_| async {
            Err::<Value, _>(anyhow::anyhow!("disk on fire"))
        })
        .shared()]);
        let mut active = ActiveSet::new();
        let out = parse(&hub.handle(&mut active, HubRequest::call("boom", "")).await);
        assert_eq!(out, json!({"mode": "call", "tool": "boom", "error": "disk on fire"}));
        assert!(active.contains("boom"));
    }

    #[tokio::test]
    async fn structured_result_is_serialized() {
        let hub = hub_with(vec![FnTool::new("echo", "echo input", |input| async move {
            Ok(json!({"got": input}))
        })
        .shared()]);
        let mut active = ActiveSet::new();
        let out = parse(&hub.handle(&mut active, HubRequest::call("echo", r#"{"a":1}"#)).await);
        assert_eq!(out["result"], r#"{"got":{"a":1}}"#);
    }

    #[test]
    fn function_definition_names_the_hub() {
        let def = Hub::function_definition();
        assert_eq!(def["name"], HUB_FUNCTION_NAME);
        assert!(def["description"].as_str().unwrap().contains("action='search'"));
        assert_eq!(def["parameters"]["properties"]["k"]["maximum"], MAX_K);
    }
}
