//! Core data models for the retrieval pipeline.
//!
//! Documents flow from the knowledge directory through the chunker and
//! embedding provider into [`EmbeddingRecord`]s held by the vector index.
//! Queries come back out as [`SearchHit`]s.

use serde::Serialize;

/// A named knowledge source read from disk.
///
/// `name` is the file stem and doubles as the `source` tag on every chunk
/// derived from this document.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub content: String,
    pub content_hash: String,
}

/// A contiguous, possibly overlapping slice of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// `<source>_<chunk_index>`; stable as long as chunking parameters are.
    pub id: String,
    pub text: String,
    pub source: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// Metadata stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// A chunk paired with its dense vector, as written to the vector index.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl EmbeddingRecord {
    pub fn from_chunk(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.id,
            vector,
            metadata: ChunkMetadata {
                source: chunk.source,
                chunk_index: chunk.chunk_index,
                total_chunks: chunk.total_chunks,
            },
            text: chunk.text,
        }
    }
}

/// A nearest-neighbour result from the vector index.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub similarity: f32,
}
