//! # Sage CLI (`sage`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sage init` | Create the index database |
//! | `sage index` | Embed changed knowledge documents |
//! | `sage search "<query>"` | Show the nearest knowledge chunks |
//! | `sage eval` | Run the evaluation suite |
//! | `sage dataset` | Summarise the evaluation dataset |
//! | `sage stats` | Show index statistics |
//!
//! ## Examples
//!
//! ```bash
//! sage index --force --config ./config/sage.toml
//! sage search "I keep checking in on my team's work constantly"
//! sage eval --difficulty subtle --backend ollama --rag on
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sage_coach::dataset::Difficulty;
use sage_coach::eval::{BackendChoice, EvalOptions, RagChoice};
use sage_coach::progress::ProgressMode;
use sage_coach::{config, dataset, db, eval, indexer, retrieval, stats};

/// Sage: retrieval grounding and evaluation for archetype coaching.
#[derive(Parser)]
#[command(name = "sage", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/sage.toml`. A missing file means all defaults.
    #[arg(long, global = true, default_value = "./config/sage.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index database and schema. Idempotent.
    Init,

    /// Index the knowledge directory.
    ///
    /// Only documents whose content changed since the last pass are
    /// re-chunked and re-embedded.
    Index {
        /// Re-embed every document regardless of the hash cache.
        #[arg(long)]
        force: bool,

        /// Delete chunks whose source document no longer exists.
        #[arg(long)]
        prune: bool,
    },

    /// Print the knowledge chunks nearest to a query.
    Search {
        query: String,

        /// Number of results (defaults to `retrieval.top_k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Replay the labelled dataset through each available configuration.
    ///
    /// Individual entry failures are recorded in the report and do not
    /// change the exit status.
    Eval {
        /// Only the first few `obvious` entries.
        #[arg(long)]
        quick: bool,

        /// Only entries of this difficulty.
        #[arg(long, value_enum)]
        difficulty: Option<Difficulty>,

        /// Restrict to one backend.
        #[arg(long, value_enum)]
        backend: Option<BackendChoice>,

        /// Restrict to grounded (`on`) or ungrounded (`off`) runs.
        #[arg(long, value_enum)]
        rag: Option<RagChoice>,

        /// Print the summary without writing a report file.
        #[arg(long)]
        no_save: bool,

        /// Progress on stderr. Defaults to `human` on a TTY, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Show label counts for the evaluation dataset.
    Dataset,

    /// Show index statistics.
    Stats,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.index.path).await?;
            pool.close().await;
            println!("Index initialized at {}", cfg.index.path.display());
        }
        Commands::Index { force, prune } => {
            indexer::run_index(&cfg, force, prune).await?;
        }
        Commands::Search { query, limit } => {
            retrieval::run_search(&cfg, &query, limit).await?;
        }
        Commands::Eval {
            quick,
            difficulty,
            backend,
            rag,
            no_save,
            progress,
        } => {
            let options = EvalOptions {
                quick,
                difficulty,
                backend,
                rag,
                save: !no_save,
                progress: progress.unwrap_or_else(ProgressMode::default_for_tty),
            };
            eval::run_eval(&cfg, options).await?;
        }
        Commands::Dataset => {
            dataset::run_dataset(&cfg)?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
