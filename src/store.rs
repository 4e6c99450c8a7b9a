//! Embedding store adapter.
//!
//! [`SimilarityStore`] is the narrow contract the ingestion and retrieval
//! pipelines require from whatever similarity-search backend they are paired
//! with: add chunks, query by similarity, delete by page. The adapter owns
//! the failure policy at this boundary: reads degrade to empty result sets,
//! writes degrade to logged no-ops, and errors never propagate past it.
//! The one exception is an `add` call whose texts and metadatas disagree in
//! length; that is a caller bug and fails with [`StoreError::Validation`].
//!
//! [`SqliteStore`] is the bundled backend: chunks and their little-endian
//! f32 vector BLOBs in a single SQLite table (WAL, create-if-missing). The
//! brute-force cosine scan at query time is CPU work and runs under
//! `spawn_blocking` so it cannot stall concurrent tasks on the runtime.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{EmbeddingConfig, StoreConfig};
use crate::embed;
use crate::models::{ChunkMeta, ScoredChunk};

/// Errors surfaced by [`SimilarityStore::add`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("texts and metadatas must be the same length ({texts} texts, {metadatas} metadatas)")]
    Validation { texts: usize, metadatas: usize },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// The three operations the pipelines require from a similarity backend.
///
/// Implementations must be safe to call concurrently from multiple ingestion
/// and query flows; all methods take `&self`.
#[async_trait]
pub trait SimilarityStore: Send + Sync {
    /// Embed and index `texts` with their parallel `metadatas`.
    async fn add(&self, texts: Vec<String>, metadatas: Vec<ChunkMeta>) -> Result<(), StoreError>;

    /// Top-`k` similarity hits for `text`, highest score first. Failures are
    /// logged and yield an empty result set, never fabricated results.
    async fn query(&self, text: &str, k: usize) -> Vec<ScoredChunk>;

    /// Remove every chunk belonging to `page_id`. Failures are logged no-ops.
    async fn delete_by_page(&self, page_id: &str);
}

/// SQLite-backed similarity store.
pub struct SqliteStore {
    pool: SqlitePool,
    embedding: EmbeddingConfig,
}

impl SqliteStore {
    /// Open (or create) the store at the configured path.
    pub async fn connect(store: &StoreConfig, embedding: EmbeddingConfig) -> Result<Self> {
        if let Some(parent) = store.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::open(&format!("sqlite:{}", store.path.display()), 5, embedding).await
    }

    /// Open an ephemeral in-memory store. Used by tests and demos; a single
    /// connection keeps every handle on the same database.
    pub async fn in_memory(embedding: EmbeddingConfig) -> Result<Self> {
        Self::open("sqlite::memory:", 1, embedding).await
    }

    async fn open(url: &str, max_connections: u32, embedding: EmbeddingConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id          TEXT PRIMARY KEY,
                page_id     TEXT NOT NULL,
                title       TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text        TEXT NOT NULL,
                embedding   BLOB NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_page ON chunks(page_id)")
            .execute(&pool)
            .await?;

        Ok(Self { pool, embedding })
    }

    async fn insert_chunks(
        &self,
        texts: &[String],
        metadatas: &[ChunkMeta],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (index, ((text, meta), vector)) in
            texts.iter().zip(metadatas).zip(vectors).enumerate()
        {
            sqlx::query(
                "INSERT INTO chunks (id, page_id, title, chunk_index, text, embedding) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&meta.page_id)
            .bind(&meta.title)
            .bind(index as i64)
            .bind(text)
            .bind(embed::vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query_inner(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let query_vec = embed::embed_query(&self.embedding, text).await?;

        let rows = sqlx::query("SELECT page_id, title, text, embedding FROM chunks")
            .fetch_all(&self.pool)
            .await?;

        let candidates: Vec<(String, String, String, Vec<u8>)> = rows
            .iter()
            .map(|row| {
                (
                    row.get("page_id"),
                    row.get("title"),
                    row.get("text"),
                    row.get("embedding"),
                )
            })
            .collect();

        // CPU-bound scan over every stored vector; keep it off the runtime.
        let scored = tokio::task::spawn_blocking(move || {
            let mut scored: Vec<ScoredChunk> = candidates
                .into_iter()
                .map(|(page_id, title, text, blob)| ScoredChunk {
                    score: embed::cosine_similarity(&query_vec, &embed::blob_to_vec(&blob)),
                    text,
                    meta: ChunkMeta { page_id, title },
                })
                .collect();
            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            scored.truncate(k);
            scored
        })
        .await
        .context("similarity scan task failed")?;

        Ok(scored)
    }
}

#[async_trait]
impl SimilarityStore for SqliteStore {
    async fn add(&self, texts: Vec<String>, metadatas: Vec<ChunkMeta>) -> Result<(), StoreError> {
        if texts.len() != metadatas.len() {
            return Err(StoreError::Validation {
                texts: texts.len(),
                metadatas: metadatas.len(),
            });
        }
        if texts.is_empty() {
            return Ok(());
        }

        let vectors = match embed::embed_texts(&self.embedding, &texts).await {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!(error = format!("{e:#}"), count = texts.len(), "embedding failed; chunks not indexed");
                return Ok(());
            }
        };

        debug!(count = texts.len(), "adding chunks to the store");
        if let Err(e) = self.insert_chunks(&texts, &metadatas, &vectors).await {
            warn!(error = format!("{e:#}"), "failed to persist chunks");
        }
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Vec<ScoredChunk> {
        match self.query_inner(text, k).await {
            Ok(hits) => {
                debug!(query = text, hits = hits.len(), "similarity query");
                hits
            }
            Err(e) => {
                warn!(error = format!("{e:#}"), "similarity query failed; returning no results");
                Vec::new()
            }
        }
    }

    async fn delete_by_page(&self, page_id: &str) {
        match sqlx::query("DELETE FROM chunks WHERE page_id = ?")
            .bind(page_id)
            .execute(&self.pool)
            .await
        {
            Ok(result) => {
                info!(page_id, deleted = result.rows_affected(), "deleted page chunks");
            }
            Err(e) => {
                warn!(page_id, error = %e, "failed to delete page chunks");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled_embeddings() -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "disabled".to_string(),
            ..EmbeddingConfig::default()
        }
    }

    fn meta(page_id: &str) -> ChunkMeta {
        ChunkMeta {
            page_id: page_id.to_string(),
            title: "Title".to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_rejects_length_mismatch() {
        let store = SqliteStore::in_memory(disabled_embeddings()).await.unwrap();
        let err = store
            .add(vec!["one".to_string(), "two".to_string()], vec![meta("1")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { texts: 2, metadatas: 1 }));
    }

    #[tokio::test]
    async fn test_add_with_failing_embedder_is_a_noop() {
        let store = SqliteStore::in_memory(disabled_embeddings()).await.unwrap();
        store
            .add(vec!["one".to_string()], vec![meta("1")])
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_query_failure_degrades_to_empty() {
        let store = SqliteStore::in_memory(disabled_embeddings()).await.unwrap();
        assert!(store.query("anything", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_page_removes_only_that_page() {
        let store = SqliteStore::in_memory(disabled_embeddings()).await.unwrap();
        store
            .insert_chunks(
                &["a".to_string(), "b".to_string()],
                &[meta("1"), meta("2")],
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .await
            .unwrap();

        store.delete_by_page("1").await;

        let remaining: Vec<String> = sqlx::query_scalar("SELECT page_id FROM chunks")
            .fetch_all(&store.pool)
            .await
            .unwrap();
        assert_eq!(remaining, vec!["2".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_missing_page_is_harmless() {
        let store = SqliteStore::in_memory(disabled_embeddings()).await.unwrap();
        store.delete_by_page("absent").await;
    }
}
