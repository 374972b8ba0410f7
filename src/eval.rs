//! Evaluation runner.
//!
//! Replays a labelled dataset through one or more configurations (backend ×
//! grounding on/off), extracts archetypes from each response, scores them
//! against the labels, and aggregates per configuration.
//!
//! Configurations run one after another; within a configuration, entries
//! run in dataset order, one at a time. Each (configuration, entry) moves
//! `pending → generating → scored | errored`. A failed generation is
//! recorded on that entry and the run continues; errored entries are left
//! out of every average.

use anyhow::{bail, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::archetype::{Archetype, Situation};
use crate::config::Config;
use crate::dataset::{load_dataset, quick_subset, with_difficulty, DatasetEntry, Difficulty};
use crate::generation::anthropic::api_key_from_env;
use crate::generation::prompt::{user_message, SYSTEM_PROMPT};
use crate::generation::{
    ollama_available, AnthropicBackend, Generation, GenerationRequest, Generator, OllamaBackend,
    Usage,
};
use crate::grounding::Grounding;
use crate::patterns::{extract, KeywordTable};
use crate::progress::{EvalProgressEvent, EvalProgressReporter, ProgressMode};
use crate::report;
use crate::retrieval::RetrievedContext;
use crate::scoring::{score, Score};

// ============ Results ============

/// Outcome of one scored run.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRun {
    pub detected: BTreeSet<Archetype>,
    pub metrics: Score,
    /// Expected primary was detected, or nothing was detected when no
    /// primary is expected.
    pub primary_correct: bool,
    pub false_positives: BTreeSet<Archetype>,
    pub missed: BTreeSet<Archetype>,
    pub response: String,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryOutcome {
    Scored(ScoredRun),
    Errored { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryResult {
    pub id: String,
    pub context: Situation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    pub text: String,
    pub expected_primary: Option<Archetype>,
    pub expected_secondary: Vec<Archetype>,
    pub notes: String,
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

impl EntryResult {
    fn new(entry: &DatasetEntry, outcome: EntryOutcome) -> Self {
        Self {
            id: entry.id.clone(),
            context: entry.context,
            difficulty: entry.difficulty,
            text: entry.text.clone(),
            expected_primary: entry.expected_primary,
            expected_secondary: entry.expected_secondary.clone(),
            notes: entry.notes.clone(),
            outcome,
        }
    }

    pub fn scored(&self) -> Option<&ScoredRun> {
        match &self.outcome {
            EntryOutcome::Scored(run) => Some(run),
            EntryOutcome::Errored { .. } => None,
        }
    }
}

/// Score a model response against an entry's labels.
pub fn score_entry(entry: &DatasetEntry, generation: Generation, table: KeywordTable) -> ScoredRun {
    let detected = extract(&generation.text, table);
    let expected = entry.expected();
    let metrics = score(&expected, &detected);

    let primary_correct = match entry.expected_primary {
        Some(primary) => detected.contains(&primary),
        None => detected.is_empty(),
    };
    let false_positives = detected.difference(&expected).copied().collect();
    let missed = expected.difference(&detected).copied().collect();

    ScoredRun {
        detected,
        metrics,
        primary_correct,
        false_positives,
        missed,
        response: generation.text,
        usage: generation.usage,
    }
}

/// Per-configuration aggregate. Means are over successful runs only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregate {
    pub total_entries: usize,
    pub successful: usize,
    pub errored: usize,
    pub exact_matches: usize,
    pub exact_match_rate: f64,
    pub primary_correct: usize,
    pub primary_accuracy: f64,
    pub avg_precision: f64,
    pub avg_recall: f64,
    pub avg_f1: f64,
    pub total_time: f64,
    pub avg_time: f64,
    pub total_cost: f64,
}

impl Aggregate {
    pub fn from_results(results: &[EntryResult]) -> Self {
        let scored: Vec<&ScoredRun> = results.iter().filter_map(EntryResult::scored).collect();
        let n = scored.len();
        let rate = |count: usize| if n == 0 { 0.0 } else { count as f64 / n as f64 };

        let exact_matches = scored.iter().filter(|r| r.metrics.exact_match).count();
        let primary_correct = scored.iter().filter(|r| r.primary_correct).count();
        let total_time: f64 = scored.iter().map(|r| r.usage.latency_secs).sum();

        Aggregate {
            total_entries: results.len(),
            successful: n,
            errored: results.len() - n,
            exact_matches,
            exact_match_rate: rate(exact_matches),
            primary_correct,
            primary_accuracy: rate(primary_correct),
            avg_precision: mean_of(&scored, |r| r.metrics.precision),
            avg_recall: mean_of(&scored, |r| r.metrics.recall),
            avg_f1: mean_of(&scored, |r| r.metrics.f1),
            total_time,
            avg_time: if n == 0 { 0.0 } else { total_time / n as f64 },
            total_cost: scored.iter().map(|r| r.usage.cost).sum(),
        }
    }
}

fn mean_of(runs: &[&ScoredRun], f: impl Fn(&ScoredRun) -> f64) -> f64 {
    if runs.is_empty() {
        return 0.0;
    }
    runs.iter().map(|r| f(r)).sum::<f64>() / runs.len() as f64
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationRun {
    pub name: String,
    pub backend: String,
    pub use_rag: bool,
    pub results: Vec<EntryResult>,
    pub aggregate: Aggregate,
}

#[derive(Debug, Clone)]
pub struct EvalRun {
    pub timestamp: DateTime<Local>,
    pub configurations: Vec<ConfigurationRun>,
}

// ============ Pipeline ============

/// One coaching turn: optional retrieval, prompt assembly, generation.
pub struct CoachingPipeline<'a> {
    generator: &'a dyn Generator,
    grounding: Option<&'a Grounding>,
}

impl<'a> CoachingPipeline<'a> {
    /// `grounding` is `None` for configurations that run without retrieval.
    pub fn new(generator: &'a dyn Generator, grounding: Option<&'a Grounding>) -> Self {
        Self {
            generator,
            grounding,
        }
    }

    pub async fn respond(&self, situation: Situation, text: &str) -> Result<Generation> {
        let retrieved = match self.grounding {
            Some(grounding) => match grounding.context_for(text).await {
                Ok(ctx) => ctx,
                Err(e) => {
                    tracing::warn!(error = %e, "retrieval failed, generating without grounding");
                    RetrievedContext::default()
                }
            },
            None => RetrievedContext::default(),
        };

        let request = GenerationRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_message: user_message(situation, text, &retrieved.context),
            history: Vec::new(),
        };
        let mut generation = self.generator.generate(&request).await?;
        generation.usage.grounded = !retrieved.is_empty();
        generation.usage.sources = retrieved.sources;
        Ok(generation)
    }
}

// ============ Runner ============

/// A named backend + grounding combination to replay the dataset under.
pub struct EvalConfiguration {
    pub name: String,
    pub use_rag: bool,
    pub generator: Arc<dyn Generator>,
}

pub struct EvalRunner<'a> {
    grounding: &'a Grounding,
    table: KeywordTable,
    progress: &'a dyn EvalProgressReporter,
}

impl<'a> EvalRunner<'a> {
    pub fn new(
        grounding: &'a Grounding,
        table: KeywordTable,
        progress: &'a dyn EvalProgressReporter,
    ) -> Self {
        Self {
            grounding,
            table,
            progress,
        }
    }

    pub async fn run(&self, entries: &[DatasetEntry], configurations: &[EvalConfiguration]) -> EvalRun {
        let timestamp = Local::now();
        let mut runs = Vec::with_capacity(configurations.len());
        for configuration in configurations {
            runs.push(self.run_configuration(entries, configuration).await);
        }
        EvalRun {
            timestamp,
            configurations: runs,
        }
    }

    async fn run_configuration(
        &self,
        entries: &[DatasetEntry],
        configuration: &EvalConfiguration,
    ) -> ConfigurationRun {
        let name = configuration.name.clone();
        self.progress.report(EvalProgressEvent::ConfigurationStarted {
            name: name.clone(),
            entries: entries.len(),
        });

        let grounding = configuration.use_rag.then_some(self.grounding);
        let pipeline = CoachingPipeline::new(configuration.generator.as_ref(), grounding);
        let mut results = Vec::with_capacity(entries.len());

        for (i, entry) in entries.iter().enumerate() {
            self.progress.report(EvalProgressEvent::EntryStarted {
                configuration: name.clone(),
                id: entry.id.clone(),
                n: i + 1,
                total: entries.len(),
            });

            let outcome = match pipeline.respond(entry.context, &entry.text).await {
                Ok(generation) => {
                    let run = score_entry(entry, generation, self.table);
                    self.progress.report(EvalProgressEvent::EntryScored {
                        configuration: name.clone(),
                        id: entry.id.clone(),
                        exact_match: run.metrics.exact_match,
                        expected: entry.expected().into_iter().collect(),
                        detected: run.detected.iter().copied().collect(),
                    });
                    EntryOutcome::Scored(run)
                }
                Err(e) => {
                    let error = format!("{:#}", e);
                    tracing::warn!(configuration = %name, entry = %entry.id, error = %error, "generation failed");
                    self.progress.report(EvalProgressEvent::EntryErrored {
                        configuration: name.clone(),
                        id: entry.id.clone(),
                        error: error.clone(),
                    });
                    EntryOutcome::Errored { error }
                }
            };
            results.push(EntryResult::new(entry, outcome));
        }

        let aggregate = Aggregate::from_results(&results);
        self.progress.report(EvalProgressEvent::ConfigurationFinished {
            name: name.clone(),
            successful: aggregate.successful,
            exact_matches: aggregate.exact_matches,
            errored: aggregate.errored,
        });

        ConfigurationRun {
            name,
            backend: configuration.generator.backend().to_string(),
            use_rag: configuration.use_rag,
            results,
            aggregate,
        }
    }
}

// ============ Configuration selection ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendChoice {
    Anthropic,
    Ollama,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RagChoice {
    On,
    Off,
}

fn rag_variants(
    label: &str,
    generator: Arc<dyn Generator>,
    rag: Option<RagChoice>,
) -> Vec<EvalConfiguration> {
    let mut out = Vec::new();
    if rag != Some(RagChoice::Off) {
        out.push(EvalConfiguration {
            name: format!("{} + RAG", label),
            use_rag: true,
            generator: generator.clone(),
        });
    }
    if rag != Some(RagChoice::On) {
        out.push(EvalConfiguration {
            name: format!("{} (no RAG)", label),
            use_rag: false,
            generator,
        });
    }
    out
}

/// The configurations to run: Claude ± RAG when `ANTHROPIC_API_KEY` is set,
/// Ollama ± RAG when the local server answers, narrowed by the CLI flags.
///
/// Fails before any generation when nothing is available.
pub async fn select_configurations(
    config: &Config,
    backend: Option<BackendChoice>,
    rag: Option<RagChoice>,
) -> Result<Vec<EvalConfiguration>> {
    let mut configurations = Vec::new();

    if backend != Some(BackendChoice::Ollama) {
        match api_key_from_env() {
            Some(key) => {
                let claude: Arc<dyn Generator> =
                    Arc::new(AnthropicBackend::new(&config.generation, key)?);
                configurations.extend(rag_variants("Claude", claude, rag));
            }
            None => tracing::info!("ANTHROPIC_API_KEY not set, skipping Claude configurations"),
        }
    }

    if backend != Some(BackendChoice::Anthropic) {
        if ollama_available(&config.generation.ollama_url).await {
            let ollama: Arc<dyn Generator> = Arc::new(OllamaBackend::new(&config.generation)?);
            configurations.extend(rag_variants("Ollama", ollama, rag));
        } else {
            eprintln!(
                "Ollama not available at {}, skipping Ollama configurations",
                config.generation.ollama_url
            );
        }
    }

    if configurations.is_empty() {
        bail!("no generation backend available (set ANTHROPIC_API_KEY or start Ollama)");
    }
    Ok(configurations)
}

// ============ CLI ============

pub struct EvalOptions {
    pub quick: bool,
    pub difficulty: Option<Difficulty>,
    pub backend: Option<BackendChoice>,
    pub rag: Option<RagChoice>,
    pub save: bool,
    pub progress: ProgressMode,
}

/// Select the entries an eval run covers. `--quick` wins over
/// `--difficulty`.
pub fn select_entries(
    entries: &[DatasetEntry],
    quick: bool,
    difficulty: Option<Difficulty>,
    quick_count: usize,
) -> Vec<DatasetEntry> {
    if quick {
        quick_subset(entries, quick_count)
    } else if let Some(d) = difficulty {
        with_difficulty(entries, d)
    } else {
        entries.to_vec()
    }
}

/// `sage eval`: run the suite, print the summary, save the report.
pub async fn run_eval(config: &Config, options: EvalOptions) -> Result<()> {
    let dataset = load_dataset(config.eval.dataset.as_deref())?;
    let entries = select_entries(
        &dataset,
        options.quick,
        options.difficulty,
        config.eval.quick_count,
    );
    if entries.is_empty() {
        bail!("No dataset entries selected");
    }

    let configurations = select_configurations(config, options.backend, options.rag).await?;

    let grounding = if configurations.iter().any(|c| c.use_rag) {
        Grounding::from_config(config).await
    } else {
        Grounding::Unavailable {
            reason: "no RAG configuration selected".to_string(),
        }
    };
    if let Grounding::Unavailable { reason } = &grounding {
        if configurations.iter().any(|c| c.use_rag) {
            eprintln!("Warning: grounding unavailable ({}); RAG configurations run ungrounded", reason);
        }
    }

    let reporter = options.progress.reporter();
    let table = KeywordTable::from_match_aliases(config.eval.match_aliases);
    let run = EvalRunner::new(&grounding, table, reporter.as_ref())
        .run(&entries, &configurations)
        .await;

    report::print_summary(&run);
    if options.save {
        let path = report::save_report(&run, &config.eval.results_dir, config.eval.response_excerpt_chars)?;
        println!();
        println!("Results saved to: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(primary: Option<Archetype>, secondary: Vec<Archetype>) -> DatasetEntry {
        DatasetEntry {
            id: "e1".into(),
            context: Situation::Setback,
            text: "text".into(),
            expected_primary: primary,
            expected_secondary: secondary,
            notes: String::new(),
            difficulty: None,
        }
    }

    fn generation(text: &str, latency: f64, cost: f64) -> Generation {
        Generation {
            text: text.to_string(),
            usage: Usage {
                latency_secs: latency,
                cost,
                ..Usage::default()
            },
        }
    }

    #[test]
    fn test_score_entry_detail_sets() {
        let e = entry(Some(Archetype::Parrot), vec![Archetype::Peacock]);
        let run = score_entry(
            &e,
            generation("The Parrot, and maybe the Rabbit.", 1.0, 0.0),
            KeywordTable::NamesAndAliases,
        );
        assert!(run.primary_correct);
        assert_eq!(run.false_positives, BTreeSet::from([Archetype::Rabbit]));
        assert_eq!(run.missed, BTreeSet::from([Archetype::Peacock]));
        assert_eq!(run.metrics.precision, 0.5);
    }

    #[test]
    fn test_score_entry_without_primary() {
        let e = entry(None, vec![Archetype::Octopus]);
        let quiet = score_entry(&e, generation("Sounds like a layoff.", 1.0, 0.0), KeywordTable::NamesOnly);
        assert!(quiet.primary_correct);
        assert!(quiet.metrics.exact_match);
        assert!(quiet.missed.is_empty());

        let noisy = score_entry(&e, generation("The Octopus!", 1.0, 0.0), KeywordTable::NamesOnly);
        assert!(!noisy.primary_correct);
        assert_eq!(noisy.false_positives, BTreeSet::from([Archetype::Octopus]));
    }

    #[test]
    fn test_aggregate_excludes_errors() {
        let e = entry(Some(Archetype::Rabbit), vec![]);
        let results = vec![
            EntryResult::new(
                &e,
                EntryOutcome::Scored(score_entry(&e, generation("Rabbit", 2.0, 0.01), KeywordTable::NamesOnly)),
            ),
            EntryResult::new(
                &e,
                EntryOutcome::Scored(score_entry(&e, generation("nothing", 4.0, 0.03), KeywordTable::NamesOnly)),
            ),
            EntryResult::new(&e, EntryOutcome::Errored { error: "boom".into() }),
        ];
        let agg = Aggregate::from_results(&results);
        assert_eq!(agg.total_entries, 3);
        assert_eq!(agg.successful, 2);
        assert_eq!(agg.errored, 1);
        assert_eq!(agg.exact_matches, 1);
        assert_eq!(agg.exact_match_rate, 0.5);
        assert_eq!(agg.primary_accuracy, 0.5);
        assert_eq!(agg.avg_recall, 0.5);
        assert_eq!(agg.avg_f1, 0.5);
        assert_eq!(agg.total_time, 6.0);
        assert_eq!(agg.avg_time, 3.0);
        assert!((agg.total_cost - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_aggregate_of_all_errors_is_zeroed() {
        let e = entry(None, vec![]);
        let results = vec![EntryResult::new(&e, EntryOutcome::Errored { error: "x".into() })];
        let agg = Aggregate::from_results(&results);
        assert_eq!(agg.successful, 0);
        assert_eq!(agg.exact_match_rate, 0.0);
        assert_eq!(agg.avg_f1, 0.0);
        assert_eq!(agg.avg_time, 0.0);
    }

    #[test]
    fn test_errored_entry_serializes_with_status() {
        let e = entry(None, vec![]);
        let r = EntryResult::new(&e, EntryOutcome::Errored { error: "timeout".into() });
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["status"], "errored");
        assert_eq!(v["error"], "timeout");
        assert_eq!(v["id"], "e1");
    }

    #[test]
    fn test_select_entries_quick_and_difficulty() {
        let mut a = entry(None, vec![]);
        a.id = "a".into();
        a.difficulty = Some(Difficulty::Subtle);
        let mut b = entry(None, vec![]);
        b.id = "b".into();
        b.difficulty = Some(Difficulty::Obvious);
        let mut c = entry(None, vec![]);
        c.id = "c".into();
        c.difficulty = Some(Difficulty::Obvious);
        let all = vec![a, b, c];

        let quick = select_entries(&all, true, None, 1);
        assert_eq!(quick.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["b"]);
        let subtle = select_entries(&all, false, Some(Difficulty::Subtle), 3);
        assert_eq!(subtle.len(), 1);
        assert_eq!(select_entries(&all, false, None, 3).len(), 3);
    }
}
