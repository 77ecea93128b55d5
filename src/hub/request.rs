//! Wire types for the `tool_hub` function.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const MIN_K: usize = 1;
pub const MAX_K: usize = 50;

/// Arguments of a single `tool_hub` invocation.
///
/// Every field is optional on the wire. `k` stays an untyped JSON value
/// so that strings, floats and garbage can be normalized by [`clamp_k`]
/// instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubRequest {
    #[serde(deserialize_with = "lenient_string")]
    pub action: String,
    #[serde(deserialize_with = "lenient_string")]
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<Value>,
    #[serde(deserialize_with = "lenient_string")]
    pub tool_name: String,
    /// JSON-encoded arguments for the target tool. Models sometimes send
    /// an object here instead of a string; it is re-encoded as text.
    #[serde(deserialize_with = "lenient_string")]
    pub tool_input: String,
}

/// `null` becomes `""`, non-string values become their JSON text.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

impl HubRequest {
    pub fn search(query: impl Into<String>, k: Option<usize>) -> Self {
        Self {
            action: "search".into(),
            query: query.into(),
            k: k.map(Value::from),
            ..Self::default()
        }
    }

    pub fn call(tool_name: impl Into<String>, tool_input: impl Into<String>) -> Self {
        Self {
            action: "call".into(),
            tool_name: tool_name.into(),
            tool_input: tool_input.into(),
            ..Self::default()
        }
    }

    pub(crate) fn route(&self) -> Route {
        let act = self.action.trim().to_lowercase();
        if matches!(act.as_str(), "search" | "find" | "fetch")
            || (act.is_empty() && !self.query.is_empty())
        {
            Route::Search
        } else if act == "call" || !self.tool_name.is_empty() {
            Route::Call
        } else {
            Route::Invalid
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    Search,
    Call,
    Invalid,
}

/// Normalize a requested result count into `[MIN_K, MAX_K]`.
///
/// Integers, floats (truncated) and numeric strings are honoured;
/// anything else falls back to `default`, which is clamped as well.
/// Fractional strings truncate like numbers do, so `"2.5"` asks for 2
/// rather than being rejected.
pub fn clamp_k(k: Option<&Value>, default: usize) -> usize {
    let requested = match k {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => parse_numeric(s.trim()),
        _ => None,
    };
    match requested {
        Some(v) => v.clamp(MIN_K as i64, MAX_K as i64) as usize,
        None => default.clamp(MIN_K, MAX_K),
    }
}

fn parse_numeric(s: &str) -> Option<i64> {
    s.parse::<i64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    })
}

// ── Response payloads ────────────────────────────────────────

pub(crate) fn search_response(fetched: &[String], active: &[String]) -> String {
    json!({"mode": "search", "fetched": fetched, "active": active}).to_string()
}

pub(crate) fn call_result(tool: &str, result: &str) -> String {
    json!({"mode": "call", "tool": tool, "result": result}).to_string()
}

pub(crate) fn call_error(tool: &str, error: &str) -> String {
    json!({"mode": "call", "tool": tool, "error": error}).to_string()
}

pub(crate) fn tool_not_found(tool: &str) -> String {
    json!({"mode": "call", "error": format!("tool '{tool}' not found")}).to_string()
}

pub(crate) fn invalid_action() -> String {
    json!({"error": "invalid action; use 'search' or 'call'"}).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_k_bounds() {
        assert_eq!(clamp_k(Some(&json!(0)), 8), 1);
        assert_eq!(clamp_k(Some(&json!(-3)), 8), 1);
        assert_eq!(clamp_k(Some(&json!(1000)), 8), 50);
        assert_eq!(clamp_k(Some(&json!(5)), 8), 5);
    }

    #[test]
    fn clamp_k_accepts_strings_and_floats() {
        assert_eq!(clamp_k(Some(&json!("3")), 8), 3);
        assert_eq!(clamp_k(Some(&json!(" 12 ")), 8), 12);
        assert_eq!(clamp_k(Some(&json!(4.9)), 8), 4);
        assert_eq!(clamp_k(Some(&json!("2.5")), 8), 2);
        assert_eq!(clamp_k(Some(&json!(u64::MAX)), 8), 50);
    }

    #[test]
    fn clamp_k_defaults_on_garbage() {
        assert_eq!(clamp_k(None, 8), 8);
        assert_eq!(clamp_k(Some(&Value::Null), 8), 8);
        assert_eq!(clamp_k(Some(&json!("abc")), 8), 8);
        assert_eq!(clamp_k(Some(&json!([3])), 8), 8);
        assert_eq!(clamp_k(Some(&json!(true)), 8), 8);
    }

    #[test]
    fn clamp_k_clamps_the_default_too() {
        assert_eq!(clamp_k(None, 0), 1);
        assert_eq!(clamp_k(None, 500), 50);
    }

    #[test]
    fn routing_synonyms_and_implicit_actions() {
        let route = |v: Value| serde_json::from_value::<HubRequest>(v).unwrap().route();
        assert_eq!(route(json!({"action": "Find", "query": "x"})), Route::Search);
        assert_eq!(route(json!({"action": " fetch "})), Route::Search);
        assert_eq!(route(json!({"query": "x"})), Route::Search);
        assert_eq!(route(json!({"action": "CALL"})), Route::Call);
        assert_eq!(route(json!({"tool_name": "B"})), Route::Call);
        assert_eq!(route(json!({"action": "delete"})), Route::Invalid);
        assert_eq!(route(json!({})), Route::Invalid);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let req: HubRequest = serde_json::from_str(r#"{"action":"search"}"#).unwrap();
        assert_eq!(req.query, "");
        assert_eq!(req.k, None);
        assert_eq!(req.tool_input, "");
    }

    #[test]
    fn object_tool_input_is_reencoded() {
        let req: HubRequest = serde_json::from_value(json!({
            "action": "call",
            "tool_name": "B",
            "tool_input": {"path": "/tmp"},
            "query": null
        }))
        .unwrap();
        assert_eq!(req.tool_input, r#"{"path":"/tmp"}"#);
        assert_eq!(req.query, "");
    }

    #[test]
    fn not_found_payload_shape() {
        let v: Value = serde_json::from_str(&tool_not_found("Z")).unwrap();
        assert_eq!(v, json!({"mode": "call", "error": "tool 'Z' not found"}));
    }
}
