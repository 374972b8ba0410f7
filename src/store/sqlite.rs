//! SQLite-backed [`VectorIndex`].
//!
//! One row per chunk in the `embeddings` table (see [`crate::migrate`]).
//! Vectors are little-endian f32 BLOBs; queries load every row and rank in
//! Rust.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::path::Path;

use crate::db;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::models::{ChunkMetadata, EmbeddingRecord, SearchHit};

use super::{rank_top_k, SourceCount, VectorIndex};

pub struct SqliteIndex {
    pool: SqlitePool,
    model: String,
}

impl SqliteIndex {
    /// Open the index database at `path`, creating it if needed.
    ///
    /// `model` is recorded on every row written through this handle.
    pub async fn open(path: &Path, model: impl Into<String>) -> Result<Self> {
        let pool = db::connect(path).await?;
        Ok(Self::from_pool(pool, model))
    }

    pub fn from_pool(pool: SqlitePool, model: impl Into<String>) -> Self {
        Self {
            pool,
            model: model.into(),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_record(row: &SqliteRow) -> EmbeddingRecord {
    let blob: Vec<u8> = row.get("embedding");
    let chunk_index: i64 = row.get("chunk_index");
    let total_chunks: i64 = row.get("total_chunks");
    EmbeddingRecord {
        id: row.get("id"),
        vector: blob_to_vec(&blob),
        text: row.get("text"),
        metadata: ChunkMetadata {
            source: row.get("source"),
            chunk_index: chunk_index.max(0) as usize,
            total_chunks: total_chunks.max(0) as usize,
        },
    }
}

async fn insert_records(
    tx: &mut Transaction<'_, Sqlite>,
    model: &str,
    records: &[EmbeddingRecord],
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    for rec in records {
        sqlx::query(
            r#"
            INSERT INTO embeddings
                (id, source, chunk_index, total_chunks, text, embedding, model, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                source = excluded.source,
                chunk_index = excluded.chunk_index,
                total_chunks = excluded.total_chunks,
                text = excluded.text,
                embedding = excluded.embedding,
                model = excluded.model,
                created_at = excluded.created_at
            "#,
        )
        .bind(&rec.id)
        .bind(&rec.metadata.source)
        .bind(rec.metadata.chunk_index as i64)
        .bind(rec.metadata.total_chunks as i64)
        .bind(&rec.text)
        .bind(vec_to_blob(&rec.vector))
        .bind(model)
        .bind(now)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("Failed to upsert embedding '{}'", rec.id))?;
    }
    Ok(())
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        insert_records(&mut tx, &self.model, records).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Deletes and inserts in one transaction.
    async fn replace_sources(&self, sources: &[String], records: &[EmbeddingRecord]) -> Result<usize> {
        if sources.is_empty() && records.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut removed = 0usize;
        for source in sources {
            let result = sqlx::query("DELETE FROM embeddings WHERE source = ?")
                .bind(source)
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected() as usize;
        }
        insert_records(&mut tx, &self.model, records).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn delete_by_source(&self, source: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM embeddings WHERE source = ?")
            .bind(source)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query(
            "SELECT id, source, chunk_index, total_chunks, text, embedding FROM embeddings",
        )
        .fetch_all(&self.pool)
        .await?;

        let records: Vec<EmbeddingRecord> = rows.iter().map(row_to_record).collect();
        Ok(rank_top_k(
            vector,
            records.iter().map(|r| (r.id.as_str(), r)),
            k,
        ))
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings")
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as usize)
    }

    async fn get(&self, id: &str) -> Result<Option<EmbeddingRecord>> {
        let row = sqlx::query(
            "SELECT id, source, chunk_index, total_chunks, text, embedding FROM embeddings WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn source_counts(&self) -> Result<Vec<SourceCount>> {
        let rows = sqlx::query(
            "SELECT source, COUNT(*) AS chunks FROM embeddings GROUP BY source ORDER BY source",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let chunks: i64 = row.get("chunks");
                SourceCount {
                    source: row.get("source"),
                    chunks: chunks.max(0) as usize,
                }
            })
            .collect())
    }
}
