//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the contract the indexer and retriever rely
//! on: upsert by id, delete by source, cosine nearest-neighbour query, and
//! counting. Two backends implement it:
//!
//! - [`SqliteIndex`] — persistent, one row per chunk in the `embeddings`
//!   table. The default for the CLI.
//! - [`InMemoryIndex`] — `HashMap` behind a lock, for tests.
//!
//! Both compute similarity by brute force over every stored vector, which
//! is fine at knowledge-base scale (tens to hundreds of chunks).
//!
//! Single-writer: the SQLite backend assumes one process touches the index
//! at a time.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryIndex;
pub use sqlite::SqliteIndex;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{EmbeddingRecord, SearchHit};

/// Chunk count for one source, as reported by [`VectorIndex::source_counts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCount {
    pub source: String,
    pub chunks: usize,
}

/// Persistent store of embedded chunks.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert records, overwriting any existing entry with the same id.
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()>;

    /// Remove every entry whose `metadata.source` equals `source`.
    /// Returns the number of entries removed.
    async fn delete_by_source(&self, source: &str) -> Result<usize>;

    /// The `k` entries most similar to `vector`, by descending cosine
    /// similarity.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Total number of stored entries.
    async fn count(&self) -> Result<usize>;

    /// Fetch a single entry by id.
    async fn get(&self, id: &str) -> Result<Option<EmbeddingRecord>>;

    /// Entries per source, sorted by source name.
    async fn source_counts(&self) -> Result<Vec<SourceCount>>;

    /// Delete every entry belonging to `sources`, then insert `records`.
    /// Returns the number of entries deleted.
    ///
    /// Backends that can should apply this as one unit, so a failure leaves
    /// the previous entries in place.
    async fn replace_sources(&self, sources: &[String], records: &[EmbeddingRecord]) -> Result<usize> {
        let mut removed = 0;
        for source in sources {
            removed += self.delete_by_source(source).await?;
        }
        self.upsert(records).await?;
        Ok(removed)
    }
}

/// Rank `(record, vector)` candidates against `query` and keep the top `k`.
///
/// Ties are broken by id so results are deterministic.
pub(crate) fn rank_top_k<'a, I>(query: &[f32], candidates: I, k: usize) -> Vec<SearchHit>
where
    I: IntoIterator<Item = (&'a str, &'a EmbeddingRecord)>,
{
    let mut scored: Vec<(&str, SearchHit)> = candidates
        .into_iter()
        .map(|(id, rec)| {
            (
                id,
                SearchHit {
                    text: rec.text.clone(),
                    metadata: rec.metadata.clone(),
                    similarity: cosine_similarity(query, &rec.vector),
                },
            )
        })
        .collect();

    scored.sort_by(|(id_a, a), (id_b, b)| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| id_a.cmp(id_b))
    });
    scored.truncate(k);
    scored.into_iter().map(|(_, hit)| hit).collect()
}
