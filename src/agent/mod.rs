//! Function-calling agent loop.
//!
//! The model is offered exactly one function, `tool_hub`. Each call it
//! makes is dispatched through the [`Hub`] against the query's
//! [`ActiveSet`], the JSON result is fed back as a `tool` message, and
//! the model is re-queried until it produces a final reply or the
//! iteration budget runs out.

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::hub::{ActiveSet, Hub, HUB_FUNCTION_NAME};
use crate::models::{ChatMessage, FunctionCallItem, ModelProvider, ProviderResponse, TokenUsage};
use crate::utils::truncate_str;

/// Outcome of one agent run.
#[derive(Debug, Clone)]
pub struct AgentReply {
    /// Final assistant text (or a loop-exhausted notice).
    pub text: String,
    /// Model round-trips made.
    pub model_calls: u32,
    /// Hub dispatches made.
    pub hub_calls: u32,
    pub tokens: TokenUsage,
}

/// Run `query` through the model with `tool_hub` as its only function.
///
/// `max_iterations` bounds the number of tool rounds; when the model
/// still wants to call functions after that, the reply is a notice
/// naming the pending calls instead of an error.
pub async fn run_query(
    provider: &dyn ModelProvider,
    hub: &Hub,
    active: &mut ActiveSet,
    query: &str,
    max_iterations: usize,
) -> anyhow::Result<AgentReply> {
    let functions = vec![Hub::function_definition()];
    let mut messages = vec![ChatMessage::new("user", query)];
    let mut tokens = TokenUsage::default();
    let mut model_calls: u32 = 0;
    let mut hub_calls: u32 = 0;

    let (mut response, usage) = provider
        .send_chat_with_functions(&messages, &functions)
        .await
        .context("model call failed")?;
    model_calls += 1;
    if let Some(ref u) = usage {
        tokens.accumulate(u);
    }

    for iter in 0..max_iterations {
        let calls = match response {
            ProviderResponse::Final(_) => break,
            other => other.into_calls(),
        };
        debug!(iteration = iter, calls = calls.len(), "model requested function calls");

        let calls: Vec<FunctionCallItem> = calls
            .into_iter()
            .map(|c| FunctionCallItem {
                id: if c.id.is_empty() {
                    format!("call_{}", uuid::Uuid::new_v4().simple())
                } else {
                    c.id
                },
                ..c
            })
            .collect();

        let mut assistant = ChatMessage::new("assistant", "");
        assistant.tool_calls = Some(
            calls
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "id": c.id,
                        "type": "function",
                        "function": {"name": c.name, "arguments": c.arguments},
                    })
                })
                .collect(),
        );
        messages.push(assistant);

        // Calls share the active set, so they run in order.
        for call in &calls {
            let result = if call.name == HUB_FUNCTION_NAME {
                hub_calls += 1;
                hub.handle_json(active, &call.arguments).await
            } else {
                warn!(function = %call.name, "model called an unknown function");
                serde_json::json!({
                    "error": format!("unknown function '{}'; only {HUB_FUNCTION_NAME} is available", call.name)
                })
                .to_string()
            };
            debug!(
                function = %call.name,
                args = %truncate_str(&call.arguments, 200),
                result = %truncate_str(&result, 200),
                "function call dispatched"
            );
            messages.push(ChatMessage::tool_result(call.id.clone(), result));
        }

        let (next, usage) = provider
            .send_chat_with_functions(&messages, &functions)
            .await
            .context("model call failed (function-call loop)")?;
        response = next;
        model_calls += 1;
        if let Some(ref u) = usage {
            tokens.accumulate(u);
        }
    }

    let text = match response {
        ProviderResponse::Final(text) => text,
        ProviderResponse::FunctionCall { name, arguments, .. } => {
            warn!(max_iterations, "tool loop exhausted");
            format!("[tool loop exhausted] last call: {name}({arguments})")
        }
        ProviderResponse::MultiFunctionCall(calls) => {
            warn!(max_iterations, "tool loop exhausted");
            let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
            format!("[tool loop exhausted] last calls: {}", names.join(", "))
        }
    };

    info!(
        model_calls,
        hub_calls,
        active = active.len(),
        total_tokens = tokens.total_tokens,
        "query complete"
    );

    Ok(AgentReply {
        text,
        model_calls,
        hub_calls,
        tokens,
    })
}
