use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::hub::{MAX_K, MIN_K};
use crate::index::store::validate_collection_name;
use crate::index::{Embedder, HttpEmbedder, IndexOptions};
use crate::utils::resolve_env_ref;

pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
pub const DEFAULT_SEARCH_K: usize = 8;
pub const DEFAULT_MAX_RESULT_CHARS: usize = 4000;
pub const DEFAULT_COLLECTION_NAME: &str = "tool_fetcher_tools_collection";
pub const DEFAULT_MAX_AGENT_ITERATIONS: usize = 10;

/// Top-level configuration loaded from `config.yaml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Retrieval and dispatch settings.
    #[serde(default)]
    pub hub: HubSettings,
    /// Chat model used by `toolhub ask`.
    #[serde(default)]
    pub model: Option<ModelConfig>,
    /// YAML manifest declaring command-backed tools.
    #[serde(default)]
    pub tools_manifest: Option<String>,
}

/// Hub settings. Every field has a default, so an empty `hub:` section
/// (or none at all) is valid.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HubSettings {
    /// Embedding model id sent to the embeddings endpoint.
    #[serde(default = "default_embedding_model_id")]
    pub embedding_model_id: String,
    /// OpenAI-compatible embeddings URL. Without one the semantic index
    /// is disabled and searches use substring matching only.
    #[serde(default)]
    pub embedding_endpoint: Option<String>,
    /// API key for the embeddings endpoint (plain text or `$ENV_VAR`).
    #[serde(default)]
    pub embedding_api_key: Option<String>,
    /// Number of tools a search returns when the model gives no `k`.
    #[serde(default = "default_search_k")]
    pub default_search_k: usize,
    /// Recreate the vector collection on every setup.
    #[serde(default = "default_true")]
    pub drop_old_collection: bool,
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
    /// Tool results are cut to this many characters.
    #[serde(default = "default_max_result_chars")]
    pub max_result_chars: usize,
    /// SQLite file for the vector collection. `None` keeps it in memory.
    #[serde(default)]
    pub index_path: Option<String>,
    /// File receiving one `[TOOL] <name>` line per tool call.
    #[serde(default)]
    pub usage_log_path: Option<String>,
    /// Upper bound on model round-trips per query.
    #[serde(default = "default_max_agent_iterations")]
    pub max_agent_iterations: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            embedding_model_id: default_embedding_model_id(),
            embedding_endpoint: None,
            embedding_api_key: None,
            default_search_k: DEFAULT_SEARCH_K,
            drop_old_collection: true,
            collection_name: default_collection_name(),
            max_result_chars: DEFAULT_MAX_RESULT_CHARS,
            index_path: None,
            usage_log_path: None,
            max_agent_iterations: DEFAULT_MAX_AGENT_ITERATIONS,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_embedding_model_id() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_search_k() -> usize {
    DEFAULT_SEARCH_K
}

fn default_collection_name() -> String {
    DEFAULT_COLLECTION_NAME.to_string()
}

fn default_max_result_chars() -> usize {
    DEFAULT_MAX_RESULT_CHARS
}

fn default_max_agent_iterations() -> usize {
    DEFAULT_MAX_AGENT_ITERATIONS
}

impl HubSettings {
    /// Validate semantic constraints that serde cannot enforce.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(MIN_K..=MAX_K).contains(&self.default_search_k) {
            anyhow::bail!(
                "config: hub.default_search_k must be between {MIN_K} and {MAX_K} (got {})",
                self.default_search_k
            );
        }
        if self.max_result_chars == 0 {
            anyhow::bail!("config: hub.max_result_chars must be greater than 0");
        }
        validate_collection_name(&self.collection_name)
            .context("config: hub.collection_name")?;
        if self.max_agent_iterations == 0 {
            anyhow::bail!("config: hub.max_agent_iterations must be greater than 0");
        }
        if let Some(ref endpoint) = self.embedding_endpoint {
            if endpoint.trim().is_empty() {
                anyhow::bail!("config: hub.embedding_endpoint is empty");
            }
        }
        Ok(())
    }

    /// Build the configured embedding client, if any.
    pub fn embedder(&self) -> anyhow::Result<Option<Arc<dyn Embedder>>> {
        let Some(ref endpoint) = self.embedding_endpoint else {
            return Ok(None);
        };
        let api_key = self
            .embedding_api_key
            .as_deref()
            .map(resolve_env_ref)
            .unwrap_or_default();
        let embedder = HttpEmbedder::new(endpoint.clone(), api_key, self.embedding_model_id.clone())?;
        Ok(Some(Arc::new(embedder)))
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            index_path: self.index_path.as_ref().map(PathBuf::from),
            collection_name: self.collection_name.clone(),
            drop_old_collection: self.drop_old_collection,
        }
    }
}

/// Chat provider settings for the agent loop.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Provider kind. Only `"openai"` (any OpenAI-compatible API) is
    /// supported.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model name to request (e.g. "gpt-4o-mini").
    pub model: String,
    /// Chat completions URL. Defaults to the public OpenAI endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// API key (plain text or env-var reference like `$OPENAI_API_KEY`).
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_provider() -> String {
    "openai".to_string()
}

impl Config {
    /// Read and parse a YAML configuration file.
    ///
    /// Relative `index_path`, `usage_log_path` and `tools_manifest`
    /// values are resolved against the config file's directory.
    pub async fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let mut config = Config::parse(&contents)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        resolve_relative(&mut config.hub.index_path, base);
        resolve_relative(&mut config.hub.usage_log_path, base);
        resolve_relative(&mut config.tools_manifest, base);

        tracing::debug!(
            path = %path.display(),
            embedding = config.hub.embedding_endpoint.is_some(),
            model = config.model.is_some(),
            "configuration loaded"
        );

        Ok(config)
    }

    /// Parse and validate YAML text.
    pub fn parse(contents: &str) -> anyhow::Result<Config> {
        let config: Config =
            serde_yaml_ng::from_str(contents).context("failed to parse config YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when it exists, otherwise fall back to defaults.
    pub async fn load_or_default(path: &Path) -> anyhow::Result<Config> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            Config::load(path).await
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Config::default())
        }
    }

    /// Validate semantic constraints that serde cannot enforce.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.hub.validate()?;
        if let Some(ref model) = self.model {
            if model.provider != "openai" {
                anyhow::bail!(
                    "config: unsupported model provider '{}' (expected 'openai')",
                    model.provider
                );
            }
            if model.model.trim().is_empty() {
                anyhow::bail!("config: model.model is empty");
            }
        }
        Ok(())
    }
}

fn resolve_relative(value: &mut Option<String>, base: &Path) {
    if let Some(ref mut v) = value {
        let p = Path::new(v.as_str());
        if p.is_relative() {
            *v = base.join(p).to_string_lossy().to_string();
        }
    }
}
