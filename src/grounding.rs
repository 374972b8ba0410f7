//! Grounding capability, decided once at startup.
//!
//! [`Grounding::Available`] wraps a [`RagEngine`]; [`Grounding::Unavailable`]
//! records why retrieval could not be set up. Callers ask for a context and
//! get an empty one from the unavailable variant instead of an error.

use anyhow::Result;

use crate::config::Config;
use crate::engine::RagEngine;
use crate::retrieval::{build_context, RetrievedContext};

pub enum Grounding {
    Available(RagEngine),
    Unavailable { reason: String },
}

impl Grounding {
    /// Open the retrieval engine described by `config`, falling back to
    /// [`Grounding::Unavailable`] with a warning if it cannot be opened.
    pub async fn from_config(config: &Config) -> Self {
        match RagEngine::open(config).await {
            Ok(engine) => Grounding::Available(engine),
            Err(e) => {
                tracing::warn!(error = %e, "grounding unavailable, RAG configurations will run ungrounded");
                Grounding::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Grounding context for `query`; empty when grounding is unavailable.
    pub async fn context_for(&self, query: &str) -> Result<RetrievedContext> {
        match self {
            Grounding::Available(engine) => {
                let k = engine.config().retrieval.top_k;
                build_context(engine, query, k).await
            }
            Grounding::Unavailable { .. } => Ok(RetrievedContext::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_yields_empty_context() {
        let g = Grounding::Unavailable {
            reason: "no model".into(),
        };
        assert!(g.context_for("anything").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_embeddings_make_grounding_unavailable() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.index.path = tmp.path().join("index.sqlite");
        config.embedding.provider = "disabled".into();
        let g = Grounding::from_config(&config).await;
        assert!(matches!(g, Grounding::Unavailable { .. }));
    }
}
