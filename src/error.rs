//! Caller-visible error taxonomy.
//!
//! Only failures that the surrounding harness must react to live here.
//! Everything below the setup contract (index outages, unknown tools,
//! tool invocation failures) is reported inside the hub's JSON payloads
//! instead and never surfaces as an `Err`.

/// Errors returned by [`ToolFetcher`](crate::session::ToolFetcher).
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// A query was processed before `set_up` (or after `tear_down`).
    #[error("process_query called before set_up")]
    NotSetUp,

    /// A tool handed to `set_up` violates the registry contract.
    #[error("invalid tool: {0}")]
    InvalidTool(String),

    /// The agent loop itself failed (model transport, provider errors).
    #[error("agent loop failed: {0:#}")]
    Agent(#[from] anyhow::Error),
}
