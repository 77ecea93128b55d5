//! Session-scoped tool registry.
//!
//! Built once from the full tool list and read-only afterwards. Keeps
//! both a name index (for the call path) and the insertion
//! order (for the lexical scorer's stable tie-break and its
//! "first N tools" fallback).

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{Tool, ToolMeta};
use crate::error::HubError;

/// Immutable name → tool mapping.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build a registry from `tools`.
    ///
    /// Empty names are rejected. A duplicate name replaces the earlier
    /// tool (last write wins) but keeps the earlier tool's position in
    /// registry order.
    pub fn new(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Result<Self, HubError> {
        let mut reg = Self::default();
        for tool in tools {
            let name = tool.name().to_string();
            if name.trim().is_empty() {
                return Err(HubError::InvalidTool(format!(
                    "tool with description {:?} has an empty name",
                    tool.description()
                )));
            }
            match reg.by_name.get(&name) {
                Some(&idx) => {
                    warn!(tool = %name, "duplicate tool name, later definition replaces earlier");
                    reg.tools[idx] = tool;
                }
                None => {
                    reg.by_name.insert(name, reg.tools.len());
                    reg.tools.push(tool);
                }
            }
        }
        debug!(total = reg.tools.len(), "tool registry built");
        Ok(reg)
    }

    /// Look up a tool by exact name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.by_name.get(name).map(|&idx| &self.tools[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All tools in registry order.
    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Names in registry order.
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn list(&self) -> Vec<ToolMeta> {
        self.tools.iter().map(|t| ToolMeta::of(t.as_ref())).collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
