//! Knowledge document discovery.
//!
//! Walks the configured knowledge directory, keeps files matching the
//! include globs (and not the exclude globs), and loads each one as a
//! [`Document`] named after its file stem. Documents are returned sorted
//! by name so index passes are deterministic.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use walkdir::WalkDir;

use crate::config::KnowledgeConfig;
use crate::models::Document;

/// Load every knowledge document under `config.dir`.
///
/// Fails if the directory does not exist, if a file cannot be read as
/// UTF-8, or if two files share the same stem (document names must be
/// unique because they tag chunks in the index).
pub fn load_documents(config: &KnowledgeConfig) -> Result<Vec<Document>> {
    let root = &config.dir;
    if !root.is_dir() {
        bail!("Knowledge directory does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let mut excludes = vec!["**/.git/**".to_string()];
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut docs = Vec::new();
    let mut seen: HashMap<String, String> = HashMap::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let doc = read_document(path)?;
        if let Some(previous) = seen.insert(doc.name.clone(), rel_str.clone()) {
            bail!(
                "Duplicate knowledge document name '{}': {} and {}",
                doc.name,
                previous,
                rel_str
            );
        }
        docs.push(doc);
    }

    docs.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::debug!(count = docs.len(), dir = %root.display(), "loaded knowledge documents");
    Ok(docs)
}

fn read_document(path: &Path) -> Result<Document> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read knowledge document: {}", path.display()))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| anyhow::anyhow!("Knowledge file has no name: {}", path.display()))?;

    Ok(Document::new(name, content))
}

impl Document {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let content_hash = content_hash(&content);
        Self {
            name: name.into(),
            content,
            content_hash,
        }
    }
}

/// SHA-256 hex digest of a document's content, used for change detection.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
