//! Evaluation progress reporting.
//!
//! The runner emits one event per configuration start/finish and per entry
//! start/outcome. Progress goes to **stderr** so stdout stays parseable.
//!
//! Human output:
//!
//! ```text
//! == Claude + RAG (16 entries)
//!   [1/16] setback_parrot_obvious ... exact match
//!   [2/16] setback_mixed_subtle ... expected [parrot, peacock, rabbit], got [parrot]
//!   [3/16] decision_octopus_obvious ... error: Anthropic API error 529: overloaded
//! == Claude + RAG done: 1/2 exact, 1 errored
//! ```

use std::io::Write;

use crate::archetype::Archetype;

#[derive(Clone, Debug)]
pub enum EvalProgressEvent {
    ConfigurationStarted {
        name: String,
        entries: usize,
    },
    EntryStarted {
        configuration: String,
        id: String,
        n: usize,
        total: usize,
    },
    EntryScored {
        configuration: String,
        id: String,
        exact_match: bool,
        expected: Vec<Archetype>,
        detected: Vec<Archetype>,
    },
    EntryErrored {
        configuration: String,
        id: String,
        error: String,
    },
    ConfigurationFinished {
        name: String,
        successful: usize,
        exact_matches: usize,
        errored: usize,
    },
}

pub trait EvalProgressReporter: Send + Sync {
    fn report(&self, event: EvalProgressEvent);
}

fn id_list(items: &[Archetype]) -> String {
    let ids: Vec<&str> = items.iter().map(|a| a.id()).collect();
    format!("[{}]", ids.join(", "))
}

/// Human-friendly progress on stderr.
pub struct StderrProgress;

impl EvalProgressReporter for StderrProgress {
    fn report(&self, event: EvalProgressEvent) {
        // Entry start and outcome share one line.
        let text = match &event {
            EvalProgressEvent::ConfigurationStarted { name, entries } => {
                format!("== {} ({} entries)\n", name, entries)
            }
            EvalProgressEvent::EntryStarted { id, n, total, .. } => {
                format!("  [{}/{}] {} ... ", n, total, id)
            }
            EvalProgressEvent::EntryScored {
                exact_match,
                expected,
                detected,
                ..
            } => {
                if *exact_match {
                    "exact match\n".to_string()
                } else {
                    format!("expected {}, got {}\n", id_list(expected), id_list(detected))
                }
            }
            EvalProgressEvent::EntryErrored { error, .. } => format!("error: {}\n", error),
            EvalProgressEvent::ConfigurationFinished {
                name,
                successful,
                exact_matches,
                errored,
            } => format!(
                "== {} done: {}/{} exact, {} errored\n",
                name, exact_matches, successful, errored
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(text.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JsonProgress {
    fn to_json(event: &EvalProgressEvent) -> serde_json::Value {
        match event {
            EvalProgressEvent::ConfigurationStarted { name, entries } => serde_json::json!({
                "event": "configuration_started",
                "configuration": name,
                "entries": entries,
            }),
            EvalProgressEvent::EntryStarted {
                configuration,
                id,
                n,
                total,
            } => serde_json::json!({
                "event": "entry_started",
                "configuration": configuration,
                "id": id,
                "n": n,
                "total": total,
            }),
            EvalProgressEvent::EntryScored {
                configuration,
                id,
                exact_match,
                expected,
                detected,
            } => serde_json::json!({
                "event": "entry_scored",
                "configuration": configuration,
                "id": id,
                "exact_match": exact_match,
                "expected": expected,
                "detected": detected,
            }),
            EvalProgressEvent::EntryErrored {
                configuration,
                id,
                error,
            } => serde_json::json!({
                "event": "entry_errored",
                "configuration": configuration,
                "id": id,
                "error": error,
            }),
            EvalProgressEvent::ConfigurationFinished {
                name,
                successful,
                exact_matches,
                errored,
            } => serde_json::json!({
                "event": "configuration_finished",
                "configuration": name,
                "successful": successful,
                "exact_matches": exact_matches,
                "errored": errored,
            }),
        }
    }
}

impl EvalProgressReporter for JsonProgress {
    fn report(&self, event: EvalProgressEvent) {
        if let Ok(line) = serde_json::to_string(&Self::to_json(&event)) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl EvalProgressReporter for NoProgress {
    fn report(&self, _event: EvalProgressEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn EvalProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_list() {
        assert_eq!(id_list(&[]), "[]");
        assert_eq!(
            id_list(&[Archetype::Parrot, Archetype::GoldenRetriever]),
            "[parrot, golden_retriever]"
        );
    }

    #[test]
    fn test_json_event_shape() {
        let v = JsonProgress::to_json(&EvalProgressEvent::EntryScored {
            configuration: "Ollama + RAG".into(),
            id: "x".into(),
            exact_match: false,
            expected: vec![Archetype::Rabbit],
            detected: vec![],
        });
        assert_eq!(v["event"], "entry_scored");
        assert_eq!(v["expected"][0], "rabbit");
        assert_eq!(v["detected"].as_array().unwrap().len(), 0);
    }
}
