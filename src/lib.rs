//! # Sage
//!
//! Retrieval grounding and evaluation for a journal-coaching assistant that
//! classifies entries against five behavioural archetypes.
//!
//! Two pipelines make up the crate:
//!
//! - **Retrieval**: knowledge documents are chunked, embedded and stored in
//!   a local vector index, re-embedding only documents whose content
//!   changed. Queries pull the nearest chunks above a similarity threshold
//!   into a grounding context.
//! - **Evaluation**: a labelled dataset is replayed through one or more
//!   generation configurations (backend × grounding on/off); archetypes are
//!   extracted from each response by keyword and scored with set
//!   precision, recall and F1.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────────┐   ┌────────────┐
//! │ knowledge │──▶│ chunk+embed │──▶│  SQLite     │
//! │   *.md    │   │  (indexer)  │   │ vector idx  │
//! └───────────┘   └─────────────┘   └─────┬──────┘
//!                                         │ retrieval
//! ┌───────────┐   ┌─────────────┐   ┌─────▼──────┐
//! │  dataset  │──▶│ eval runner │◀──│ grounding   │
//! └───────────┘   └──────┬──────┘   └────────────┘
//!                        │ generate
//!                 ┌──────▼──────┐
//!                 │ Claude /    │
//!                 │ Ollama      │
//!                 └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sage init                         # create the index database
//! sage index                        # embed ./knowledge/*.md
//! sage search "I can't let go"      # inspect retrieval
//! sage eval --quick                 # three obvious entries per configuration
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`knowledge`] | Knowledge document discovery |
//! | [`chunk`] | Paragraph chunking with word overlap |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector index trait and backends |
//! | [`hash_cache`] | Content-hash sidecar |
//! | [`indexer`] | Incremental indexing |
//! | [`engine`] | Index + provider context object |
//! | [`retrieval`] | Grounding context assembly and search |
//! | [`grounding`] | Available / unavailable grounding capability |
//! | [`archetype`] | Archetypes and situations |
//! | [`patterns`] | Archetype extraction from responses |
//! | [`scoring`] | Precision / recall / F1 |
//! | [`dataset`] | Labelled evaluation dataset |
//! | [`generation`] | LLM backends and prompts |
//! | [`eval`] | Evaluation runner |
//! | [`report`] | Summary and JSON export |

pub mod archetype;
pub mod chunk;
pub mod config;
pub mod dataset;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod eval;
pub mod generation;
pub mod grounding;
pub mod hash_cache;
mod http;
pub mod indexer;
pub mod knowledge;
pub mod migrate;
pub mod models;
pub mod patterns;
pub mod progress;
pub mod report;
pub mod retrieval;
pub mod scoring;
pub mod stats;
pub mod store;
