//! Document-name → content-hash sidecar.
//!
//! Stored as a pretty-printed JSON object next to the index database. The
//! indexer replaces it wholesale after each successful pass; it is never
//! merged.
//!
//! The cache and the index are separate files. A crash after the index
//! upsert but before [`HashCache::save`] leaves the cache behind the index,
//! which costs one redundant re-embed on the next run.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashCache {
    hashes: BTreeMap<String, String>,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cache from `path`.
    ///
    /// A missing file yields an empty cache. An unreadable or malformed file
    /// is logged and also treated as empty, so every document is re-indexed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read hash cache: {}", path.display()))?;
        match serde_json::from_str::<BTreeMap<String, String>>(&content) {
            Ok(hashes) => Ok(Self { hashes }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed hash cache");
                Ok(Self::new())
            }
        }
    }

    /// Write the cache to `path` via a temp file and rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        let json = serde_json::to_string_pretty(&self.hashes)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write hash cache: {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace hash cache: {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.hashes.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, hash: impl Into<String>) {
        self.hashes.insert(name.into(), hash.into());
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hashes.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let cache = HashCache::load(&tmp.path().join("doc_hashes.json")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sub").join("doc_hashes.json");
        let mut cache = HashCache::new();
        cache.insert("parrot", "abc");
        cache.insert("octopus", "def");
        cache.save(&path).unwrap();

        let loaded = HashCache::load(&path).unwrap();
        assert_eq!(loaded, cache);
        assert_eq!(loaded.get("parrot"), Some("abc"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_save_replaces_wholesale() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("doc_hashes.json");
        let mut first = HashCache::new();
        first.insert("old", "1");
        first.save(&path).unwrap();

        let mut second = HashCache::new();
        second.insert("new", "2");
        second.save(&path).unwrap();

        let loaded = HashCache::load(&path).unwrap();
        assert_eq!(loaded.get("old"), None);
        assert_eq!(loaded.get("new"), Some("2"));
    }

    #[test]
    fn test_malformed_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("doc_hashes.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(HashCache::load(&path).unwrap().is_empty());
    }
}
