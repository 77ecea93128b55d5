//! Embedding capability.
//!
//! [`Embedder`] turns text into vectors. The retrieval index depends
//! only on the trait; [`HttpEmbedder`] is the default implementation
//! and talks to any OpenAI-compatible `/embeddings` endpoint (OpenAI,
//! Azure-style proxies, Ollama, vLLM, text-embeddings-inference, ...).

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

/// Inputs sent per HTTP request.
const BATCH_SIZE: usize = 64;

/// Trait implemented by every embedding backend.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier of the embedding model (for logs).
    fn model_id(&self) -> &str;

    /// Embed `texts`, returning exactly one vector per input, in order.
    async fn embed(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Embedder backed by an OpenAI-compatible HTTP endpoint.
pub struct HttpEmbedder {
    endpoint: String,
    api_key: String,
    model: String,
    client: Client,
}

impl HttpEmbedder {
    /// Create an embedder posting to `endpoint` (the full URL, e.g.
    /// `http://localhost:11434/v1/embeddings`). An empty `api_key`
    /// sends no `Authorization` header.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let mut req = self.client.post(&self.endpoint).json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        let resp = req.send().await.context("embeddings request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Embeddings API returned {status}: {text}");
        }

        let json: serde_json::Value = resp.json().await.context("embeddings response is not JSON")?;
        parse_embeddings(&json, texts.len())
    }
}

/// Extract `data[*].embedding` from an embeddings response, ordered by
/// `data[*].index` when the server supplies it.
fn parse_embeddings(json: &serde_json::Value, expected: usize) -> anyhow::Result<Vec<Vec<f32>>> {
    let data = json["data"]
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("embeddings response has no `data` array"))?;

    let mut rows: Vec<(usize, Vec<f32>)> = data
        .iter()
        .enumerate()
        .map(|(pos, item)| {
            let idx = item["index"].as_u64().map(|i| i as usize).unwrap_or(pos);
            let vec = item["embedding"]
                .as_array()
                .map(|arr| arr.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect())
                .unwrap_or_default();
            (idx, vec)
        })
        .collect();
    rows.sort_by_key(|(idx, _)| *idx);

    if rows.len() != expected {
        anyhow::bail!(
            "embeddings response returned {} vectors for {} inputs",
            rows.len(),
            expected
        );
    }
    if rows.iter().any(|(_, v)| v.is_empty()) {
        anyhow::bail!("embeddings response contained an empty vector");
    }
    Ok(rows.into_iter().map(|(_, v)| v).collect())
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) {
            all.extend(self.embed_batch(chunk).await?);
        }
        Ok(all)
    }
}
