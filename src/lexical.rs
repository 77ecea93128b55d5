//! Lexical fallback scorer.
//!
//! Deterministic substring ranking over the registry, used whenever
//! the semantic index is absent, fails, or returns nothing. A pure
//! function of `(tools, query, limit)`.

use std::sync::Arc;

use crate::tools::Tool;

/// Score contributed when the query is a substring of the tool name.
pub const NAME_MATCH_WEIGHT: u32 = 2;
/// Score contributed when the query is a substring of the description.
pub const DESC_MATCH_WEIGHT: u32 = 1;

/// Score a single tool against an already-normalized query.
pub fn score(tool: &dyn Tool, normalized_query: &str) -> u32 {
    let mut score = 0;
    if tool.name().to_lowercase().contains(normalized_query) {
        score += NAME_MATCH_WEIGHT;
    }
    if tool.description().to_lowercase().contains(normalized_query) {
        score += DESC_MATCH_WEIGHT;
    }
    score
}

/// Rank `tools` for `query`, returning at most `limit` entries.
///
/// Ties keep registry order. When nothing scores, the first `limit`
/// tools in registry order are returned instead, so a non-empty
/// registry always yields a non-empty result for `limit >= 1`.
pub fn rank(tools: &[Arc<dyn Tool>], query: &str, limit: usize) -> Vec<Arc<dyn Tool>> {
    let q = query.trim().to_lowercase();

    let mut ranked: Vec<(u32, &Arc<dyn Tool>)> = tools
        .iter()
        .filter_map(|t| {
            let s = score(t.as_ref(), &q);
            (s > 0).then_some((s, t))
        })
        .collect();

    // `sort_by` is stable.
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    let picked: Vec<Arc<dyn Tool>> = ranked
        .into_iter()
        .take(limit)
        .map(|(_, t)| Arc::clone(t))
        .collect();

    if picked.is_empty() {
        tools.iter().take(limit).cloned().collect()
    } else {
        picked
    }
}
