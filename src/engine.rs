//! The retrieval engine: configuration, vector index and embedding
//! provider bundled into one value.
//!
//! A [`RagEngine`] is built once per process and passed by reference to the
//! indexer, the retriever and the grounding capability. It owns the
//! embedding provider, so a lazily loaded model is initialised at most once
//! for as long as the engine lives.

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::indexer::Indexer;
use crate::store::{SqliteIndex, VectorIndex};

pub struct RagEngine {
    config: Config,
    hash_cache_path: PathBuf,
    index: Box<dyn VectorIndex>,
    provider: Box<dyn EmbeddingProvider>,
}

impl RagEngine {
    pub fn new(
        config: Config,
        index: Box<dyn VectorIndex>,
        provider: Box<dyn EmbeddingProvider>,
    ) -> Self {
        let hash_cache_path = config.index.hash_cache_path();
        Self {
            config,
            hash_cache_path,
            index,
            provider,
        }
    }

    /// Build the engine the CLI uses: the configured embedding provider and
    /// the SQLite index at `config.index.path`.
    pub async fn open(config: &Config) -> Result<Self> {
        if !config.embedding.is_enabled() {
            bail!("Embedding provider is disabled. Set [embedding] provider in config.");
        }
        let provider = create_provider(&config.embedding)?;
        let index = SqliteIndex::open(&config.index.path, provider.model_name()).await?;
        Ok(Self::new(config.clone(), Box::new(index), provider))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    pub fn indexer(&self) -> Indexer<'_> {
        Indexer::new(
            self.index.as_ref(),
            self.provider.as_ref(),
            &self.config.chunking,
            self.config.embedding.batch_size,
            &self.hash_cache_path,
        )
    }
}
