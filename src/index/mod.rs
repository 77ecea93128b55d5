//! Retrieval index: optional semantic search over tool descriptors.
//!
//! The index is a best-effort accelerant. Construction never fails from
//! the caller's point of view: any error while embedding descriptors or
//! opening the vector store leaves the index [`IndexStatus::Absent`] for
//! the rest of the session, and the hub answers searches with the
//! lexical scorer instead. Query-time failures are caught per call,
//! mark the index [`IndexStatus::Degraded`], and yield no results so the
//! caller falls back for that call only.

pub mod embed;
pub mod store;

pub use embed::{Embedder, HttpEmbedder};
pub use store::VectorStore;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::tools::Tool;
use crate::utils::truncate_chars;

/// Descriptor text longer than this is cut before embedding.
pub const MAX_EMBEDDING_TEXT_LENGTH: usize = 2048;

/// Health of the semantic index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    /// `build` has not run yet.
    NotBuilt,
    /// Built, and the last query (if any) succeeded.
    Healthy,
    /// Built, but the most recent query failed.
    Degraded,
    /// Construction failed or no embedder was configured.
    Absent,
}

impl IndexStatus {
    fn to_u8(self) -> u8 {
        match self {
            IndexStatus::NotBuilt => 0,
            IndexStatus::Healthy => 1,
            IndexStatus::Degraded => 2,
            IndexStatus::Absent => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => IndexStatus::Healthy,
            2 => IndexStatus::Degraded,
            3 => IndexStatus::Absent,
            _ => IndexStatus::NotBuilt,
        }
    }

    /// Whether searches should consult the index at all.
    pub fn is_queryable(self) -> bool {
        matches!(self, IndexStatus::Healthy | IndexStatus::Degraded)
    }
}

/// Where and how the vector collection is stored.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// SQLite file; `None` keeps the collection in memory.
    pub index_path: Option<PathBuf>,
    pub collection_name: String,
    pub drop_old_collection: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            index_path: None,
            collection_name: crate::config::DEFAULT_COLLECTION_NAME.to_string(),
            drop_old_collection: true,
        }
    }
}

struct Backend {
    embedder: Arc<dyn Embedder>,
    store: VectorStore,
    known: HashSet<String>,
}

/// Semantic index over the registry's `{name, description}` projections.
pub struct RetrievalIndex {
    backend: Option<Backend>,
    status: AtomicU8,
}

impl Default for RetrievalIndex {
    fn default() -> Self {
        Self::with_status(IndexStatus::NotBuilt)
    }
}

impl RetrievalIndex {
    fn with_status(status: IndexStatus) -> Self {
        Self {
            backend: None,
            status: AtomicU8::new(status.to_u8()),
        }
    }

    /// An index that is absent from the start (no embedder configured).
    pub fn absent() -> Self {
        Self::with_status(IndexStatus::Absent)
    }

    /// Build the index for `tools`. Never fails: errors are logged and
    /// produce an [`IndexStatus::Absent`] index.
    pub async fn build(
        tools: &[Arc<dyn Tool>],
        embedder: Option<Arc<dyn Embedder>>,
        options: &IndexOptions,
    ) -> Self {
        let Some(embedder) = embedder else {
            info!("no embedding backend configured, using substring search only");
            return Self::absent();
        };
        match Self::try_build(tools, Arc::clone(&embedder), options).await {
            Ok(backend) => {
                info!(
                    model = %embedder.model_id(),
                    collection = %options.collection_name,
                    tools = backend.known.len(),
                    "retrieval index built"
                );
                Self {
                    backend: Some(backend),
                    status: AtomicU8::new(IndexStatus::Healthy.to_u8()),
                }
            }
            Err(e) => {
                warn!(
                    error = %format!("{e:#}"),
                    "vector index initialization failed, falling back to substring search"
                );
                Self::absent()
            }
        }
    }

    async fn try_build(
        tools: &[Arc<dyn Tool>],
        embedder: Arc<dyn Embedder>,
        options: &IndexOptions,
    ) -> anyhow::Result<Backend> {
        debug!(
            collection = %options.collection_name,
            drop_old = options.drop_old_collection,
            "building vector collection"
        );
        let store = match options.index_path {
            Some(ref path) => VectorStore::open(
                path,
                &options.collection_name,
                options.drop_old_collection,
            )?,
            None => VectorStore::open_in_memory(&options.collection_name)?,
        };

        let texts: Vec<String> = tools.iter().map(|t| document_text(t.as_ref())).collect();
        let known: HashSet<String> = tools.iter().map(|t| t.name().to_string()).collect();

        if !texts.is_empty() {
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            let vectors = embedder
                .embed(&refs)
                .await
                .context("embedding tool descriptors failed")?;
            if vectors.len() != texts.len() {
                anyhow::bail!(
                    "embedder returned {} vectors for {} descriptors",
                    vectors.len(),
                    texts.len()
                );
            }
            let rows: Vec<(String, String, Vec<f32>)> = tools
                .iter()
                .zip(texts)
                .zip(vectors)
                .map(|((t, text), v)| (t.name().to_string(), text, v))
                .collect();
            store.upsert_all(&rows).context("writing vector collection failed")?;
        }

        Ok(Backend {
            embedder,
            store,
            known,
        })
    }

    pub fn status(&self) -> IndexStatus {
        IndexStatus::from_u8(self.status.load(Ordering::Relaxed))
    }

    fn set_status(&self, status: IndexStatus) {
        self.status.store(status.to_u8(), Ordering::Relaxed);
    }

    /// Up to `k` tool names ranked by similarity to `query`.
    ///
    /// Returns an empty list when the index is unavailable or the query
    /// fails; never errors. Names the index was not built from are
    /// dropped.
    pub async fn search(&self, query: &str, k: usize) -> Vec<String> {
        let Some(ref backend) = self.backend else {
            return Vec::new();
        };
        match Self::query(backend, query, k).await {
            Ok(names) => {
                self.set_status(IndexStatus::Healthy);
                names
            }
            Err(e) => {
                warn!(
                    error = %format!("{e:#}"),
                    "vector search failed, falling back to substring search"
                );
                self.set_status(IndexStatus::Degraded);
                Vec::new()
            }
        }
    }

    async fn query(backend: &Backend, query: &str, k: usize) -> anyhow::Result<Vec<String>> {
        let mut vectors = backend.embedder.embed(&[query]).await?;
        let query_vec = vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for the query"))?;
        let hits = backend
            .store
            .search(&query_vec, k, |name| backend.known.contains(name))?;
        Ok(hits.into_iter().map(|(name, _score)| name).collect())
    }
}

impl std::fmt::Debug for RetrievalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalIndex")
            .field("status", &self.status())
            .finish()
    }
}

/// Text projection embedded for each tool.
pub fn document_text(tool: &dyn Tool) -> String {
    let text = format!("name: {} | desc: {}", tool.name(), tool.description());
    truncate_chars(&text, MAX_EMBEDDING_TEXT_LENGTH)
}
