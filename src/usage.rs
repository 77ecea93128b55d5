//! Tool usage side-channel.
//!
//! Every successful `call` lookup is recorded before the tool runs, one
//! line per call: `[TOOL] <name>`. Recording is best effort; the hub
//! logs failures and carries on.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[async_trait]
pub trait UsageLog: Send + Sync {
    async fn record(&self, tool: &str) -> anyhow::Result<()>;
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUsageLog;

#[async_trait]
impl UsageLog for NoopUsageLog {
    async fn record(&self, _tool: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Appends usage lines to a text file, creating it (and its parent
/// directory) on first write.
#[derive(Debug)]
pub struct FileUsageLog {
    path: PathBuf,
    // serializes appends from concurrent queries
    lock: Mutex<()>,
}

impl FileUsageLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl UsageLog for FileUsageLog {
    async fn record(&self, tool: &str) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("open usage log {}", self.path.display()))?;
        file.write_all(format!("[TOOL] {tool}\n").as_bytes())
            .await
            .with_context(|| format!("write usage log {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }
}
