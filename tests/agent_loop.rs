//! Integration test: the function-calling loop around `tool_hub`,
//! driven by a scripted provider.

mod common;

use std::sync::atomic::Ordering;

use common::{abc_tools, hub_call, ScriptedProvider};
use serde_json::{json, Value};
use toolhub::agent::run_query;
use toolhub::config::HubSettings;
use toolhub::hub::{ActiveSet, Hub};
use toolhub::models::{FunctionCallItem, ProviderResponse};

async fn hub() -> Hub {
    Hub::build(abc_tools(), None, &HubSettings::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn plain_reply_needs_no_tools() {
    let provider = ScriptedProvider::new(vec![ProviderResponse::Final("42".into())]);
    let hub = hub().await;
    let mut active = ActiveSet::new();
    let reply = run_query(&provider, &hub, &mut active, "what is 6*7?", 10)
        .await
        .unwrap();
    assert_eq!(reply.text, "42");
    assert_eq!(reply.model_calls, 1);
    assert_eq!(reply.hub_calls, 0);
    assert!(active.is_empty());

    // No system prompt: the query goes to the model as-is.
    let first = provider.request(0);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].role, "user");
    assert_eq!(first[0].content, "what is 6*7?");
}

#[tokio::test]
async fn parallel_calls_share_the_active_set() {
    let provider = ScriptedProvider::new(vec![
        ProviderResponse::MultiFunctionCall(vec![
            FunctionCallItem {
                id: "a".into(),
                name: "tool_hub".into(),
                arguments: json!({"action": "search", "query": "web"}).to_string(),
            },
            FunctionCallItem {
                id: "b".into(),
                name: "tool_hub".into(),
                arguments: json!({"action": "search", "query": "file"}).to_string(),
            },
        ]),
        ProviderResponse::Final("done".into()),
    ]);
    let hub = hub().await;
    let mut active = ActiveSet::new();
    let reply = run_query(&provider, &hub, &mut active, "q", 10).await.unwrap();
    assert_eq!(reply.hub_calls, 2);
    assert_eq!(active.snapshot(), vec!["A", "B"]);

    let second = provider.request(1);
    // user, assistant(tool_calls), tool a, tool b
    assert_eq!(second.len(), 4);
    assert_eq!(second[1].tool_calls.as_ref().unwrap().len(), 2);
    assert_eq!(second[2].tool_call_id.as_deref(), Some("a"));
    assert_eq!(second[3].tool_call_id.as_deref(), Some("b"));
    let b: Value = serde_json::from_str(&second[3].content).unwrap();
    assert_eq!(b["active"], json!(["A", "B"]));
}

#[tokio::test]
async fn missing_call_ids_are_generated() {
    let provider = ScriptedProvider::new(vec![hub_call("", json!({"action": "search", "query": "web"}))]);
    let hub = hub().await;
    let mut active = ActiveSet::new();
    run_query(&provider, &hub, &mut active, "q", 10).await.unwrap();

    let second = provider.request(1);
    let id = second[2].tool_call_id.clone().unwrap();
    assert!(id.starts_with("call_"));
    assert_eq!(second[1].tool_calls.as_ref().unwrap()[0]["id"], json!(id));
}

#[tokio::test]
async fn unknown_function_is_reported_back() {
    let provider = ScriptedProvider::new(vec![ProviderResponse::FunctionCall {
        id: "x".into(),
        name: "read_file".into(),
        arguments: "{}".into(),
    }]);
    let hub = hub().await;
    let mut active = ActiveSet::new();
    let reply = run_query(&provider, &hub, &mut active, "q", 10).await.unwrap();
    assert_eq!(reply.hub_calls, 0);
    let fed_back = provider.request(1);
    let payload: Value = serde_json::from_str(&fed_back[2].content).unwrap();
    assert!(payload["error"].as_str().unwrap().contains("tool_hub"));
}

#[tokio::test]
async fn malformed_arguments_do_not_abort_the_loop() {
    let provider = ScriptedProvider::new(vec![ProviderResponse::FunctionCall {
        id: "x".into(),
        name: "tool_hub".into(),
        arguments: "{\"action\": ".into(),
    }]);
    let hub = hub().await;
    let mut active = ActiveSet::new();
    let reply = run_query(&provider, &hub, &mut active, "q", 10).await.unwrap();
    assert_eq!(reply.text, "done");
    let payload: Value = serde_json::from_str(&provider.request(1)[2].content).unwrap();
    assert_eq!(payload["error"], "invalid action; use 'search' or 'call'");
}

#[tokio::test]
async fn iteration_budget_is_enforced() {
    let script: Vec<_> = (0..10)
        .map(|i| hub_call(&format!("c{i}"), json!({"action": "search", "query": "web"})))
        .collect();
    let provider = ScriptedProvider::new(script);
    let hub = hub().await;
    let mut active = ActiveSet::new();
    let reply = run_query(&provider, &hub, &mut active, "loop forever", 3)
        .await
        .unwrap();
    assert!(reply.text.starts_with("[tool loop exhausted]"));
    assert_eq!(reply.hub_calls, 3);
    // initial request plus one per completed iteration
    assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    assert_eq!(reply.tokens.total_tokens, 60);
}
