//! Vector collection backed by SQLite.
//!
//! One table per collection, keyed by tool name, holding the embedded
//! text and its vector as a little-endian `f32` blob. Similarity
//! queries are a cosine scan over the collection, which is plenty for
//! registries of a few thousand tools.

use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use rusqlite::{params, Connection};

/// SQLite-backed embedding collection.
pub struct VectorStore {
    conn: Mutex<Connection>,
    collection: String,
}

impl VectorStore {
    /// Open (or create) the collection in the database at `db_path`.
    ///
    /// With `drop_old` the collection table is dropped and recreated.
    pub fn open(db_path: &Path, collection: &str, drop_old: bool) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create index dir {}", parent.display()))?;
            }
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("open index database {}", db_path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init(conn, collection, drop_old)
    }

    /// Open a private in-memory collection.
    pub fn open_in_memory(collection: &str) -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?, collection, true)
    }

    fn init(conn: Connection, collection: &str, drop_old: bool) -> anyhow::Result<Self> {
        validate_collection_name(collection)?;
        if drop_old {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS \"{collection}\";"))?;
        }
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{collection}\" (
                name      TEXT PRIMARY KEY,
                text      TEXT NOT NULL,
                embedding BLOB NOT NULL,
                dim       INTEGER NOT NULL
            );"
        ))?;
        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Upsert `(name, text, embedding)` rows in a single transaction.
    pub fn upsert_all(&self, rows: &[(String, String, Vec<f32>)]) -> anyhow::Result<()> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("index db poisoned"))?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO \"{}\" (name, text, embedding, dim)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(name) DO UPDATE SET text=?2, embedding=?3, dim=?4",
                self.collection
            ))?;
            for (name, text, embedding) in rows {
                stmt.execute(params![
                    name,
                    text,
                    embedding_to_blob(embedding),
                    embedding.len() as i64
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Return up to `k` `(name, similarity)` pairs, most similar first,
    /// considering only rows whose name passes `keep`.
    ///
    /// Rows whose dimension differs from the query (left over from a
    /// different embedding model) are skipped.
    pub fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        keep: impl Fn(&str) -> bool,
    ) -> anyhow::Result<Vec<(String, f64)>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("index db poisoned"))?;
        let mut stmt = conn.prepare(&format!(
            "SELECT name, embedding, dim FROM \"{}\"",
            self.collection
        ))?;
        let rows = stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            let dim: i64 = row.get(2)?;
            Ok((name, blob, dim as usize))
        })?;

        let mut scored: Vec<(String, f64)> = Vec::new();
        for row in rows {
            let (name, blob, dim) = row?;
            if dim != query_embedding.len() || !keep(&name) {
                continue;
            }
            let emb = blob_to_embedding(&blob, dim);
            scored.push((name, cosine_similarity(query_embedding, &emb)));
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    pub fn count(&self) -> anyhow::Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("index db poisoned"))?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{}\"", self.collection),
            [],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Collection names become table identifiers, so keep them boring.
pub fn validate_collection_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        anyhow::bail!("invalid collection name {name:?}: use ASCII letters, digits and '_'");
    }
    Ok(())
}

fn embedding_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8], dim: usize) -> Vec<f32> {
    blob.chunks_exact(4)
        .take(dim)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity; zero when either vector has no magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom < 1e-12 {
        0.0
    } else {
        dot / denom
    }
}
