//! toolhub: retrieval-and-dispatch hub for LLM agents.
//!
//! A model is given a single function, `tool_hub`, through which it
//! searches an arbitrarily large tool registry (semantic index with a
//! substring fallback) and then calls the tools it found by name.
//!
//! This library crate re-exports modules so integration tests (under
//! `tests/`) and embedding applications can access them.

pub mod agent;
pub mod config;
pub mod error;
pub mod hub;
pub mod index;
pub mod lexical;
pub mod models;
pub mod session;
pub mod tools;
pub mod usage;
pub mod utils;

pub use error::HubError;
pub use hub::{ActiveSet, Hub, HubRequest};
pub use session::ToolFetcher;
pub use tools::{FnTool, Tool, ToolRegistry};

/// Return the toolhub home directory.
///
/// Resolution order:
/// 1. `TOOLHUB_HOME` environment variable
/// 2. `$HOME/.toolhub`
pub fn toolhub_home() -> std::path::PathBuf {
    if let Ok(p) = std::env::var("TOOLHUB_HOME") {
        std::path::PathBuf::from(p)
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join(".toolhub")
    }
}
