//! Evaluation report: console summary and JSON export.
//!
//! The saved report keeps configurations in run order:
//!
//! ```json
//! {
//!   "timestamp": "2026-01-01T12:00:00+00:00",
//!   "configurations": {
//!     "Claude + RAG": { "backend": "anthropic", "use_rag": true, "results": [...], "aggregate": {...} }
//!   }
//! }
//! ```
//!
//! Raw responses are cut to `response_excerpt_chars` characters in the saved
//! file.

use anyhow::{Context, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::eval::{Aggregate, ConfigurationRun, EntryOutcome, EntryResult, EvalRun};
use crate::retrieval::excerpt;

#[derive(Serialize)]
struct ConfigurationBody<'a> {
    backend: &'a str,
    use_rag: bool,
    results: &'a [EntryResult],
    aggregate: &'a Aggregate,
}

struct Configurations<'a>(&'a [ConfigurationRun]);

impl Serialize for Configurations<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for c in self.0 {
            map.serialize_entry(
                &c.name,
                &ConfigurationBody {
                    backend: &c.backend,
                    use_rag: c.use_rag,
                    results: &c.results,
                    aggregate: &c.aggregate,
                },
            )?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    timestamp: String,
    configurations: Configurations<'a>,
}

/// The report as JSON, with responses truncated to `excerpt_chars`.
pub fn report_json(run: &EvalRun, excerpt_chars: usize) -> Result<String> {
    let mut configurations = run.configurations.clone();
    for c in &mut configurations {
        for r in &mut c.results {
            if let EntryOutcome::Scored(scored) = &mut r.outcome {
                scored.response = excerpt(&scored.response, excerpt_chars);
            }
        }
    }

    let doc = ReportDocument {
        timestamp: run.timestamp.to_rfc3339(),
        configurations: Configurations(&configurations),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Write the report to `<dir>/eval_<YYYYmmdd_HHMMSS>.json`.
pub fn save_report(run: &EvalRun, dir: &Path, excerpt_chars: usize) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create results directory: {}", dir.display()))?;
    let path = dir.join(format!("eval_{}.json", run.timestamp.format("%Y%m%d_%H%M%S")));
    let json = report_json(run, excerpt_chars)?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(path)
}

pub fn print_summary(run: &EvalRun) {
    println!();
    println!("Evaluation Summary");
    println!("==================");

    for c in &run.configurations {
        let a = &c.aggregate;
        println!();
        println!("{}:", c.name);
        println!(
            "  Exact match rate:  {:.1}% ({}/{})",
            a.exact_match_rate * 100.0,
            a.exact_matches,
            a.successful
        );
        println!(
            "  Primary accuracy:  {:.1}% ({}/{})",
            a.primary_accuracy * 100.0,
            a.primary_correct,
            a.successful
        );
        println!("  Avg F1:            {:.3}", a.avg_f1);
        println!("  Avg time:          {:.2}s", a.avg_time);
        println!("  Total cost:        ${:.4}", a.total_cost);
        println!("  Errored:           {}", a.errored);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archetype::{Archetype, Situation};
    use crate::eval::score_entry;
    use crate::generation::{Generation, Usage};
    use crate::dataset::DatasetEntry;
    use crate::patterns::KeywordTable;
    use chrono::TimeZone;

    fn sample_run(response: &str) -> EvalRun {
        let entry = DatasetEntry {
            id: "octopus_01".into(),
            context: Situation::Decision,
            text: "I review every PR.".into(),
            expected_primary: Some(Archetype::Octopus),
            expected_secondary: vec![],
            notes: String::new(),
            difficulty: None,
        };
        let scored = score_entry(
            &entry,
            Generation {
                text: response.to_string(),
                usage: Usage::default(),
            },
            KeywordTable::NamesOnly,
        );
        let results = vec![
            crate::eval::EntryResult {
                id: entry.id.clone(),
                context: entry.context,
                difficulty: None,
                text: entry.text.clone(),
                expected_primary: entry.expected_primary,
                expected_secondary: vec![],
                notes: String::new(),
                outcome: EntryOutcome::Scored(scored),
            },
        ];
        let aggregate = Aggregate::from_results(&results);
        EvalRun {
            timestamp: chrono::Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap(),
            configurations: vec![
                ConfigurationRun {
                    name: "Zeta (no RAG)".into(),
                    backend: "ollama".into(),
                    use_rag: false,
                    results: results.clone(),
                    aggregate: aggregate.clone(),
                },
                ConfigurationRun {
                    name: "Alpha + RAG".into(),
                    backend: "ollama".into(),
                    use_rag: true,
                    results,
                    aggregate,
                },
            ],
        }
    }

    #[test]
    fn test_report_keeps_run_order_and_truncates() {
        let long = format!("The Octopus. {}", "x".repeat(100));
        let json = report_json(&sample_run(&long), 20).unwrap();
        let zeta = json.find("Zeta (no RAG)").unwrap();
        let alpha = json.find("Alpha + RAG").unwrap();
        assert!(zeta < alpha);

        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        let r = &v["configurations"]["Alpha + RAG"]["results"][0];
        assert_eq!(r["status"], "scored");
        assert_eq!(r["response"].as_str().unwrap().chars().count(), 23);
        assert!(r["response"].as_str().unwrap().ends_with("..."));
        assert_eq!(v["configurations"]["Alpha + RAG"]["aggregate"]["exact_matches"], 1);
    }

    #[test]
    fn test_save_report_file_name() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = save_report(&sample_run("The Octopus"), &tmp.path().join("evals"), 500).unwrap();
        assert_eq!(path.file_name().unwrap(), "eval_20260304_050607.json");
        assert!(path.exists());
    }
}
