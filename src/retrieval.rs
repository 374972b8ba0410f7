//! Query-time retrieval.
//!
//! [`build_context`] embeds a query, takes the top-`k` neighbours from the
//! vector index, drops those at or below [`SIMILARITY_THRESHOLD`], and
//! assembles the survivors into a grounding block:
//!
//! ```text
//! [From: octopus]
//! <chunk text>
//!
//! ---
//!
//! [From: parrot]
//! <chunk text>
//! ```
//!
//! An empty result is a normal outcome, not an error.

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::engine::RagEngine;
use crate::knowledge::load_documents;
use crate::models::SearchHit;

/// Minimum cosine similarity (exclusive) for a chunk to enter the context.
pub const SIMILARITY_THRESHOLD: f32 = 0.3;

/// Separator placed between chunks in the assembled context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const SEARCH_EXCERPT_CHARS: usize = 300;

/// Grounding text plus the distinct sources it was drawn from, in order of
/// first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetrievedContext {
    pub context: String,
    pub sources: Vec<String>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.context.is_empty()
    }
}

/// Filter `hits` by the similarity threshold and format the survivors.
///
/// `hits` must already be ordered by descending similarity; that order is
/// preserved.
pub fn assemble_context(hits: &[SearchHit]) -> RetrievedContext {
    let mut parts = Vec::new();
    let mut sources: Vec<String> = Vec::new();

    for hit in hits.iter().filter(|h| h.similarity > SIMILARITY_THRESHOLD) {
        parts.push(format!("[From: {}]\n{}", hit.metadata.source, hit.text));
        if !sources.contains(&hit.metadata.source) {
            sources.push(hit.metadata.source.clone());
        }
    }

    let dropped = hits.len() - parts.len();
    if dropped > 0 {
        tracing::debug!(dropped, threshold = SIMILARITY_THRESHOLD, "hits below threshold");
    }

    RetrievedContext {
        context: parts.join(CONTEXT_SEPARATOR),
        sources,
    }
}

/// Index the knowledge directory if the vector index is empty.
///
/// The pass is forced: an empty index next to a populated hash cache means
/// the cache is stale.
pub async fn ensure_indexed(engine: &RagEngine) -> Result<()> {
    if engine.index().count().await? > 0 {
        return Ok(());
    }
    tracing::info!("index is empty, indexing knowledge base");
    let documents = load_documents(&engine.config().knowledge)?;
    engine.indexer().index(&documents, true).await?;
    Ok(())
}

/// Embed `query` and return the raw top-`k` neighbours, indexing first if
/// the index is empty.
pub async fn retrieve(engine: &RagEngine, query: &str, k: usize) -> Result<Vec<SearchHit>> {
    ensure_indexed(engine).await?;
    let vector = engine.provider().embed_one(query).await?;
    engine.index().query(&vector, k).await
}

/// Build the grounding context for `query` from the top-`k` neighbours.
pub async fn build_context(engine: &RagEngine, query: &str, k: usize) -> Result<RetrievedContext> {
    let hits = retrieve(engine, query, k).await?;
    Ok(assemble_context(&hits))
}

/// `sage search`: print the raw nearest neighbours of `query`.
pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let engine = RagEngine::open(config).await?;
    let k = limit.unwrap_or(config.retrieval.top_k);
    let hits = retrieve(&engine, query, k).await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} (chunk {}/{})",
            i + 1,
            hit.similarity,
            hit.metadata.source,
            hit.metadata.chunk_index + 1,
            hit.metadata.total_chunks
        );
        println!("   {}", excerpt(&hit.text, SEARCH_EXCERPT_CHARS));
        println!();
    }

    Ok(())
}

/// The first `max_chars` characters of `text`, with `"..."` appended when
/// truncated.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn hit(source: &str, text: &str, similarity: f32) -> SearchHit {
        SearchHit {
            text: text.to_string(),
            metadata: ChunkMetadata {
                source: source.to_string(),
                chunk_index: 0,
                total_chunks: 1,
            },
            similarity,
        }
    }

    #[test]
    fn test_formats_and_dedups_sources() {
        let ctx = assemble_context(&[
            hit("octopus", "A", 0.9),
            hit("parrot", "B", 0.8),
            hit("octopus", "C", 0.7),
        ]);
        assert_eq!(
            ctx.context,
            "[From: octopus]\nA\n\n---\n\n[From: parrot]\nB\n\n---\n\n[From: octopus]\nC"
        );
        assert_eq!(ctx.sources, vec!["octopus", "parrot"]);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let ctx = assemble_context(&[hit("a", "x", 0.3), hit("b", "y", 0.29)]);
        assert!(ctx.is_empty());
        assert!(ctx.sources.is_empty());

        let ctx = assemble_context(&[hit("a", "x", 0.31)]);
        assert_eq!(ctx.context, "[From: a]\nx");
    }

    #[test]
    fn test_no_hits_is_empty_context() {
        assert_eq!(assemble_context(&[]), RetrievedContext::default());
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        assert_eq!(excerpt("short", 300), "short");
        assert_eq!(excerpt("🐙🐙🐙", 2), "🐙🐙...");
        assert_eq!(excerpt("abc", 3), "abc");
    }
}
