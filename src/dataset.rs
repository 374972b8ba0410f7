//! Labelled evaluation dataset.
//!
//! A dataset is a JSON array of entries:
//!
//! ```json
//! {
//!   "id": "parrot_01",
//!   "context": "setback",
//!   "text": "I didn't get the job...",
//!   "primary_saboteur": "parrot",
//!   "secondary_saboteurs": [],
//!   "notes": "why it is labelled this way",
//!   "difficulty": "obvious"
//! }
//! ```
//!
//! `primary_saboteur` may be `null` for entries with no clear pattern;
//! `difficulty` is optional. A dataset is compiled into the binary and used
//! unless `[eval] dataset` points at another file.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::Path;

use crate::archetype::{Archetype, Situation};
use crate::config::Config;

const BUNDLED_DATASET: &str = include_str!("../data/eval_dataset.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Obvious,
    Subtle,
    Complex,
    Edge,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Obvious => "obvious",
            Difficulty::Subtle => "subtle",
            Difficulty::Complex => "complex",
            Difficulty::Edge => "edge",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub id: String,
    pub context: Situation,
    pub text: String,
    #[serde(rename = "primary_saboteur")]
    pub expected_primary: Option<Archetype>,
    #[serde(rename = "secondary_saboteurs", default)]
    pub expected_secondary: Vec<Archetype>,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
}

impl DatasetEntry {
    /// Primary plus secondary labels, or the empty set when there is no
    /// primary. Secondary labels on an entry without a primary are ignored.
    pub fn expected(&self) -> BTreeSet<Archetype> {
        match self.expected_primary {
            Some(primary) => std::iter::once(primary)
                .chain(self.expected_secondary.iter().copied())
                .collect(),
            None => BTreeSet::new(),
        }
    }
}

/// The dataset compiled into the binary.
pub fn bundled_dataset() -> Result<Vec<DatasetEntry>> {
    parse_dataset(BUNDLED_DATASET).context("Bundled dataset is invalid")
}

/// Load the configured dataset, or the bundled one when none is set.
pub fn load_dataset(path: Option<&Path>) -> Result<Vec<DatasetEntry>> {
    match path {
        None => bundled_dataset(),
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read dataset: {}", path.display()))?;
            parse_dataset(&content)
                .with_context(|| format!("Failed to parse dataset: {}", path.display()))
        }
    }
}

pub fn parse_dataset(json: &str) -> Result<Vec<DatasetEntry>> {
    let entries: Vec<DatasetEntry> = serde_json::from_str(json)?;
    let mut seen = HashSet::new();
    for entry in &entries {
        if !seen.insert(entry.id.as_str()) {
            bail!("Duplicate dataset entry id: '{}'", entry.id);
        }
    }
    Ok(entries)
}

/// Entries with the given difficulty, in dataset order.
pub fn with_difficulty(entries: &[DatasetEntry], difficulty: Difficulty) -> Vec<DatasetEntry> {
    entries
        .iter()
        .filter(|e| e.difficulty == Some(difficulty))
        .cloned()
        .collect()
}

/// The first `count` obvious entries, in dataset order.
pub fn quick_subset(entries: &[DatasetEntry], count: usize) -> Vec<DatasetEntry> {
    let mut obvious = with_difficulty(entries, Difficulty::Obvious);
    obvious.truncate(count);
    obvious
}

/// `sage dataset`: print label counts for the configured dataset.
pub fn run_dataset(config: &Config) -> Result<()> {
    let entries = load_dataset(config.eval.dataset.as_deref())?;

    let mut by_primary: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_context: BTreeMap<Situation, usize> = BTreeMap::new();
    let mut by_difficulty: BTreeMap<String, usize> = BTreeMap::new();
    for e in &entries {
        let primary = e
            .expected_primary
            .map(|a| a.id().to_string())
            .unwrap_or_else(|| "none".to_string());
        *by_primary.entry(primary).or_default() += 1;
        *by_context.entry(e.context).or_default() += 1;
        let difficulty = e
            .difficulty
            .map(|d| d.to_string())
            .unwrap_or_else(|| "unrated".to_string());
        *by_difficulty.entry(difficulty).or_default() += 1;
    }

    let source = config
        .eval
        .dataset
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "bundled".to_string());
    println!("dataset ({})", source);
    println!("  entries: {}", entries.len());
    println!();
    println!("  by primary archetype:");
    for (k, v) in &by_primary {
        println!("    {:<18} {}", k, v);
    }
    println!("  by context:");
    for (k, v) in &by_context {
        println!("    {:<18} {}", k.id(), v);
    }
    println!("  by difficulty:");
    for (k, v) in &by_difficulty {
        println!("    {:<18} {}", k, v);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_dataset_parses() {
        let entries = bundled_dataset().unwrap();
        assert!(entries.len() > 40);
        assert!(entries.iter().any(|e| e.expected_primary.is_none()));
        for s in Situation::ALL {
            assert!(entries.iter().any(|e| e.context == s), "no entries for {}", s);
        }
    }

    #[test]
    fn test_expected_set() {
        let entries = parse_dataset(
            r#"[
              {"id":"a","context":"setback","text":"t","primary_saboteur":"parrot","secondary_saboteurs":["rabbit"],"notes":""},
              {"id":"b","context":"decision","text":"t","primary_saboteur":null,"secondary_saboteurs":["octopus"],"notes":""}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            entries[0].expected(),
            BTreeSet::from([Archetype::Parrot, Archetype::Rabbit])
        );
        assert!(entries[1].expected().is_empty());
    }

    #[test]
    fn test_rejects_duplicate_ids_and_unknown_labels() {
        let dup = r#"[
          {"id":"a","context":"setback","text":"t","primary_saboteur":null},
          {"id":"a","context":"setback","text":"t","primary_saboteur":null}
        ]"#;
        assert!(parse_dataset(dup).is_err());

        let bad = r#"[{"id":"a","context":"setback","text":"t","primary_saboteur":"dragon"}]"#;
        assert!(parse_dataset(bad).is_err());
    }

    #[test]
    fn test_quick_subset_takes_first_obvious_in_order() {
        let entries = bundled_dataset().unwrap();
        let quick = quick_subset(&entries, 3);
        assert_eq!(quick.len(), 3);
        assert!(quick.iter().all(|e| e.difficulty == Some(Difficulty::Obvious)));

        let all_obvious = with_difficulty(&entries, Difficulty::Obvious);
        let ids: Vec<&str> = quick.iter().map(|e| e.id.as_str()).collect();
        let first: Vec<&str> = all_obvious.iter().take(3).map(|e| e.id.as_str()).collect();
        assert_eq!(ids, first);
    }

    #[test]
    fn test_missing_dataset_file_is_error() {
        assert!(load_dataset(Some(Path::new("/no/such/dataset.json"))).is_err());
    }
}
