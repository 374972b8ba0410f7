//! In-memory [`VectorIndex`] for tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{EmbeddingRecord, SearchHit};

use super::{rank_top_k, SourceCount, VectorIndex};

#[derive(Default)]
pub struct InMemoryIndex {
    records: RwLock<HashMap<String, EmbeddingRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, EmbeddingRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, EmbeddingRecord>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()> {
        let mut map = self.write();
        for rec in records {
            map.insert(rec.id.clone(), rec.clone());
        }
        Ok(())
    }

    async fn delete_by_source(&self, source: &str) -> Result<usize> {
        let mut map = self.write();
        let before = map.len();
        map.retain(|_, rec| rec.metadata.source != source);
        Ok(before - map.len())
    }

    async fn replace_sources(&self, sources: &[String], records: &[EmbeddingRecord]) -> Result<usize> {
        let mut map = self.write();
        let before = map.len();
        map.retain(|_, rec| !sources.contains(&rec.metadata.source));
        let removed = before - map.len();
        for rec in records {
            map.insert(rec.id.clone(), rec.clone());
        }
        Ok(removed)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let map = self.read();
        Ok(rank_top_k(
            vector,
            map.iter().map(|(id, rec)| (id.as_str(), rec)),
            k,
        ))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read().len())
    }

    async fn get(&self, id: &str) -> Result<Option<EmbeddingRecord>> {
        Ok(self.read().get(id).cloned())
    }

    async fn source_counts(&self) -> Result<Vec<SourceCount>> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for rec in self.read().values() {
            *counts.entry(rec.metadata.source.clone()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(source, chunks)| SourceCount { source, chunks })
            .collect())
    }
}
