//! Per-query set of tools surfaced to the model so far.

use std::collections::HashSet;
use std::sync::Arc;

use crate::tools::Tool;

/// Insertion-ordered, name-unique set of surfaced tools.
///
/// Grows monotonically within a query; [`ActiveSet::reset`] is the only
/// way to shrink it.
#[derive(Clone, Default)]
pub struct ActiveSet {
    tools: Vec<Arc<dyn Tool>>,
    names: HashSet<String>,
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.tools.clear();
        self.names.clear();
    }

    /// Add every candidate not already present, in order.
    ///
    /// Returns the names that were newly added.
    pub fn merge<'a, I>(&mut self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a Arc<dyn Tool>>,
    {
        candidates
            .into_iter()
            .filter(|t| self.register(t))
            .map(|t| t.name().to_string())
            .collect()
    }

    /// Add a single tool. Returns `false` if it was already active.
    pub fn register(&mut self, tool: &Arc<dyn Tool>) -> bool {
        if self.names.contains(tool.name()) {
            return false;
        }
        self.names.insert(tool.name().to_string());
        self.tools.push(Arc::clone(tool));
        true
    }

    /// Active tool names in insertion order.
    pub fn snapshot(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ActiveSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.snapshot()).finish()
    }
}
