//! Incremental indexing of knowledge documents.
//!
//! A pass compares each document's content hash against the persisted
//! [`HashCache`]. Unchanged documents are skipped. Changed (or new, or
//! forced) documents are re-chunked and embedded, and the new records are
//! staged. Only when every embedding has succeeded are the stale chunks of
//! those documents swapped for the staged records, in one
//! [`VectorIndex::replace_sources`] call. The hash cache is replaced after
//! that.
//!
//! An embedding or index failure aborts the pass before the index or the
//! cache is touched, so the previous chunks stay searchable and the next
//! pass retries every document that was not recorded.
//!
//! Documents that disappear from the knowledge directory keep their chunks
//! in the index unless the pass runs with `prune`.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

use crate::chunk::build_chunks;
use crate::config::{ChunkingConfig, Config};
use crate::embedding::{embed_in_batches, EmbeddingProvider};
use crate::engine::RagEngine;
use crate::hash_cache::HashCache;
use crate::knowledge::load_documents;
use crate::models::{Document, EmbeddingRecord};
use crate::store::VectorIndex;

/// Outcome of one index pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub documents: usize,
    pub reindexed: usize,
    pub skipped: usize,
    pub chunks_written: usize,
    pub pruned: usize,
}

pub struct Indexer<'a> {
    index: &'a dyn VectorIndex,
    provider: &'a dyn EmbeddingProvider,
    chunking: &'a ChunkingConfig,
    batch_size: usize,
    hash_cache_path: &'a Path,
}

impl<'a> Indexer<'a> {
    pub fn new(
        index: &'a dyn VectorIndex,
        provider: &'a dyn EmbeddingProvider,
        chunking: &'a ChunkingConfig,
        batch_size: usize,
        hash_cache_path: &'a Path,
    ) -> Self {
        Self {
            index,
            provider,
            chunking,
            batch_size,
            hash_cache_path,
        }
    }

    /// Index `documents`, returning the number of chunks newly written.
    pub async fn index(&self, documents: &[Document], force: bool) -> Result<usize> {
        Ok(self.run(documents, force, false).await?.chunks_written)
    }

    /// Index `documents` and, when `prune` is set, delete chunks whose
    /// source is not among them.
    pub async fn run(&self, documents: &[Document], force: bool, prune: bool) -> Result<IndexSummary> {
        let cached = HashCache::load(self.hash_cache_path)?;
        let mut next_cache = HashCache::new();
        let mut replaced: Vec<String> = Vec::new();
        let mut staged: Vec<EmbeddingRecord> = Vec::new();
        let mut summary = IndexSummary {
            documents: documents.len(),
            ..IndexSummary::default()
        };

        for doc in documents {
            if !force && cached.get(&doc.name) == Some(doc.content_hash.as_str()) {
                tracing::debug!(document = %doc.name, "unchanged, skipping");
                next_cache.insert(doc.name.clone(), doc.content_hash.clone());
                summary.skipped += 1;
                continue;
            }

            let chunks = build_chunks(
                &doc.name,
                &doc.content,
                self.chunking.chunk_size,
                self.chunking.overlap,
            );
            tracing::debug!(document = %doc.name, chunks = chunks.len(), "re-indexing");

            if !chunks.is_empty() {
                let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
                let vectors = embed_in_batches(self.provider, &texts, self.batch_size)
                    .await
                    .with_context(|| format!("Failed to embed document '{}'", doc.name))?;
                staged.extend(
                    chunks
                        .into_iter()
                        .zip(vectors)
                        .map(|(chunk, vector)| EmbeddingRecord::from_chunk(chunk, vector)),
                );
            }

            replaced.push(doc.name.clone());
            next_cache.insert(doc.name.clone(), doc.content_hash.clone());
            summary.reindexed += 1;
        }

        let removed = self.index.replace_sources(&replaced, &staged).await?;
        tracing::debug!(removed, written = staged.len(), "replaced stale chunks");
        summary.chunks_written = staged.len();

        if prune {
            let present: BTreeSet<&str> = documents.iter().map(|d| d.name.as_str()).collect();
            for sc in self.index.source_counts().await? {
                if !present.contains(sc.source.as_str()) {
                    let removed = self.index.delete_by_source(&sc.source).await?;
                    tracing::debug!(source = %sc.source, removed, "pruned");
                    summary.pruned += removed;
                }
            }
        }

        next_cache.save(self.hash_cache_path)?;

        tracing::info!(
            documents = summary.documents,
            reindexed = summary.reindexed,
            skipped = summary.skipped,
            chunks = summary.chunks_written,
            pruned = summary.pruned,
            "index pass complete"
        );
        Ok(summary)
    }
}

/// `sage index`: index the knowledge directory and print a summary.
pub async fn run_index(config: &Config, force: bool, prune: bool) -> Result<()> {
    let engine = RagEngine::open(config).await?;
    let documents = load_documents(&config.knowledge)?;
    let summary = engine.indexer().run(&documents, force, prune).await?;

    println!("index {}", config.knowledge.dir.display());
    println!("  documents: {}", summary.documents);
    println!("  re-indexed: {}", summary.reindexed);
    println!("  unchanged: {}", summary.skipped);
    if prune {
        println!("  pruned chunks: {}", summary.pruned);
    }
    println!("  chunks written: {}", summary.chunks_written);
    println!("  total chunks: {}", engine.index().count().await?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashProvider;
    use crate::store::{InMemoryIndex, SqliteIndex};
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Refuses to embed anything.
    struct DownProvider;

    #[async_trait]
    impl EmbeddingProvider for DownProvider {
        fn model_name(&self) -> &str {
            "hash-32"
        }
        fn dims(&self) -> usize {
            32
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            anyhow::bail!("connection refused")
        }
    }

    fn chunking() -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: 40,
            overlap: 10,
        }
    }

    #[tokio::test]
    async fn test_index_writes_chunks_and_cache() {
        let tmp = TempDir::new().unwrap();
        let cache_path = tmp.path().join("doc_hashes.json");
        let index = InMemoryIndex::new();
        let provider = HashProvider::new(32);
        let chunking = chunking();
        let indexer = Indexer::new(&index, &provider, &chunking, 8, &cache_path);

        let docs = vec![
            Document::new("parrot", "The Parrot repeats old criticism.\n\nIt is loud."),
            Document::new("rabbit", "The Rabbit runs."),
        ];
        let written = indexer.index(&docs, false).await.unwrap();
        assert_eq!(written, index.count().await.unwrap());
        assert!(written >= 2);

        let cache = HashCache::load(&cache_path).unwrap();
        assert_eq!(cache.get("parrot"), Some(docs[0].content_hash.as_str()));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_unchanged_documents_skipped_and_force_reindexes() {
        let tmp = TempDir::new().unwrap();
        let cache_path = tmp.path().join("doc_hashes.json");
        let index = InMemoryIndex::new();
        let provider = HashProvider::new(32);
        let chunking = chunking();
        let indexer = Indexer::new(&index, &provider, &chunking, 8, &cache_path);
        let docs = vec![Document::new("peacock", "The Peacock performs.")];

        assert_eq!(indexer.index(&docs, false).await.unwrap(), 1);
        let second = indexer.run(&docs, false, false).await.unwrap();
        assert_eq!(second.skipped, 1);
        assert_eq!(second.chunks_written, 0);

        let forced = indexer.run(&docs, true, false).await.unwrap();
        assert_eq!(forced.reindexed, 1);
        assert_eq!(forced.chunks_written, 1);
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_document_recorded_without_chunks() {
        let tmp = TempDir::new().unwrap();
        let cache_path = tmp.path().join("doc_hashes.json");
        let index = InMemoryIndex::new();
        let provider = HashProvider::new(32);
        let chunking = chunking();
        let indexer = Indexer::new(&index, &provider, &chunking, 8, &cache_path);

        let written = indexer.index(&[Document::new("blank", "")], false).await.unwrap();
        assert_eq!(written, 0);
        assert!(HashCache::load(&cache_path).unwrap().get("blank").is_some());
    }

    #[tokio::test]
    async fn test_removed_documents_kept_unless_pruned() {
        let tmp = TempDir::new().unwrap();
        let cache_path = tmp.path().join("doc_hashes.json");
        let index = InMemoryIndex::new();
        let provider = HashProvider::new(32);
        let chunking = chunking();
        let indexer = Indexer::new(&index, &provider, &chunking, 8, &cache_path);

        let both = vec![
            Document::new("octopus", "The Octopus clings."),
            Document::new("parrot", "The Parrot nags."),
        ];
        indexer.index(&both, false).await.unwrap();

        let only_octopus = vec![both[0].clone()];
        let summary = indexer.run(&only_octopus, false, false).await.unwrap();
        assert_eq!(summary.pruned, 0);
        assert_eq!(index.count().await.unwrap(), 2);
        assert_eq!(HashCache::load(&cache_path).unwrap().len(), 1);

        let summary = indexer.run(&only_octopus, false, true).await.unwrap();
        assert_eq!(summary.pruned, 1);
        assert_eq!(index.count().await.unwrap(), 1);
        assert!(index.get("parrot_0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_forced_pass_leaves_sqlite_index_and_cache_untouched() {
        let tmp = TempDir::new().unwrap();
        let cache_path = tmp.path().join("doc_hashes.json");
        let index = SqliteIndex::open(&tmp.path().join("index.sqlite"), "hash-32")
            .await
            .unwrap();
        let healthy = HashProvider::new(32);
        let chunking = chunking();
        let docs = vec![
            Document::new("rabbit", "The Rabbit runs from every hard conversation."),
            Document::new("owl", "The Owl watches."),
        ];
        let before = Indexer::new(&index, &healthy, &chunking, 8, &cache_path)
            .index(&docs, false)
            .await
            .unwrap();
        let cache_before = std::fs::read(&cache_path).unwrap();

        let down = DownProvider;
        let result = Indexer::new(&index, &down, &chunking, 8, &cache_path)
            .run(&docs, true, false)
            .await;
        assert!(result.is_err());
        assert_eq!(index.count().await.unwrap(), before);
        assert!(index.get("rabbit_0").await.unwrap().is_some());
        assert!(index.get("owl_0").await.unwrap().is_some());
        assert_eq!(std::fs::read(&cache_path).unwrap(), cache_before);
    }
}
