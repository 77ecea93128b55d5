//! Session lifecycle: set up, process queries, tear down.
//!
//! A [`ToolFetcher`] owns the registry, index and hub for one set of
//! tools. Queries run against the shared hub with their own fresh
//! [`ActiveSet`], so several queries may run concurrently against the
//! same session.

use std::sync::Arc;

use tracing::info;

use crate::agent;
use crate::config::HubSettings;
use crate::error::HubError;
use crate::hub::{ActiveSet, Hub};
use crate::index::Embedder;
use crate::models::ModelProvider;
use crate::tools::Tool;
use crate::usage::{NoopUsageLog, UsageLog};

struct Session {
    model: Arc<dyn ModelProvider>,
    hub: Hub,
}

/// Tool retrieval-and-dispatch session.
pub struct ToolFetcher {
    settings: HubSettings,
    embedder: Option<Arc<dyn Embedder>>,
    usage: Arc<dyn UsageLog>,
    session: Option<Session>,
}

impl ToolFetcher {
    /// `embedder` of `None` disables the semantic index; searches then
    /// always use substring matching.
    pub fn new(settings: HubSettings, embedder: Option<Arc<dyn Embedder>>) -> Self {
        Self {
            settings,
            embedder,
            usage: Arc::new(NoopUsageLog),
            session: None,
        }
    }

    pub fn with_usage_log(mut self, usage: Arc<dyn UsageLog>) -> Self {
        self.usage = usage;
        self
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    /// Build the registry and the retrieval index for `tools`.
    ///
    /// Fails only on invalid tool names; an index that cannot be built
    /// degrades to substring search. Calling it again replaces the
    /// previous session.
    pub async fn set_up(
        &mut self,
        model: Arc<dyn ModelProvider>,
        tools: Vec<Arc<dyn Tool>>,
    ) -> Result<(), HubError> {
        let hub = Hub::build(tools, self.embedder.clone(), &self.settings)
            .await?
            .with_usage_log(Arc::clone(&self.usage));
        info!(index = ?hub.index().status(), "tool fetcher set up");
        self.session = Some(Session { model, hub });
        Ok(())
    }

    pub fn is_set_up(&self) -> bool {
        self.session.is_some()
    }

    /// The session's dispatcher, for driving `search`/`call` directly.
    pub fn hub(&self) -> Result<&Hub, HubError> {
        self.session.as_ref().map(|s| &s.hub).ok_or(HubError::NotSetUp)
    }

    /// Answer `query` with the agent loop. Returns the final reply and
    /// the names of every tool surfaced while answering, in the order
    /// they were surfaced.
    pub async fn process_query(&self, query: &str) -> Result<(String, Vec<String>), HubError> {
        let session = self.session.as_ref().ok_or(HubError::NotSetUp)?;
        let mut active = ActiveSet::new();
        let reply = agent::run_query(
            session.model.as_ref(),
            &session.hub,
            &mut active,
            query,
            self.settings.max_agent_iterations,
        )
        .await?;
        Ok((reply.text, active.snapshot()))
    }

    /// Release the registry, index and hub. Subsequent queries fail with
    /// [`HubError::NotSetUp`] until `set_up` runs again.
    pub fn tear_down(&mut self) {
        if self.session.take().is_some() {
            info!("tool fetcher torn down");
        }
    }
}

impl std::fmt::Debug for ToolFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolFetcher")
            .field("settings", &self.settings)
            .field("hub", &self.session.as_ref().map(|s| &s.hub))
            .finish()
    }
}
