//! # Evidence Harness CLI (`evh`)
//!
//! The `evh` binary answers a table of per-organization questions with the
//! most relevant sentences from each organization's scraped documents.
//!
//! ## Usage
//!
//! ```bash
//! evh --config ./config/evh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `evh run` | Answer every question row and write the augmented table |
//! | `evh query "<text>" --org <name>` | Answer one question for one organization |
//! | `evh corpus` | Per-organization document and sentence counts |
//! | `evh segment <file>` | Print the page-tagged sentences of a raw text file |
//!
//! ## Examples
//!
//! ```bash
//! # Full run with the configured provider
//! evh run --config ./config/evh.toml
//!
//! # Stricter threshold, fewer sentences per answer
//! evh run --threshold 0.55 --top-k 4
//!
//! # Keyword mode needs no embedding provider
//! evh run --mode keyword --output ./keyword_answers.csv
//!
//! # Spot-check one organization
//! evh query "Does the company report water withdrawal?" --org Acme
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use evidence_harness::config::{self, Config};
use evidence_harness::progress::ProgressMode;
use evidence_harness::retrieval::RetrievalParams;
use evidence_harness::segment::{split_pages, split_sentences};
use evidence_harness::{pipeline, stats};

/// Evidence Harness CLI: per-organization sentence retrieval over
/// paginated scraped documents.
///
/// All commands except `segment` read a TOML configuration file given by
/// `--config`. See `config/evh.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "evh",
    about = "Evidence Harness: per-organization sentence retrieval over scraped documents",
    version,
    long_about = "Evidence Harness loads each organization's scraped documents, splits them into \
    page-tagged sentences, embeds them once, and answers a table of questions with the \
    sentences most similar to each question, restricted to the question's organization."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/evh.toml`. Corpus, question, retrieval,
    /// embedding, and output settings are read from this file.
    #[arg(long, global = true, default_value = "./config/evh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Retrieval overrides shared by `run` and `query`.
#[derive(clap::Args, Debug, Clone, Default)]
struct RetrievalArgs {
    /// Retrieval mode: `semantic` (embeddings) or `keyword` (no encoder).
    #[arg(long)]
    mode: Option<String>,

    /// Minimum cosine similarity for a sentence to be selected.
    #[arg(long)]
    threshold: Option<f32>,

    /// Maximum number of sentences per answer.
    #[arg(long)]
    top_k: Option<usize>,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Answer every question row and write the augmented table.
    ///
    /// Loads the corpus, segments it into sentences, encodes them once,
    /// runs one retrieval per question row, and writes the question table
    /// with six result columns added. Nothing is written if encoding fails.
    Run {
        /// Question table (CSV). Overrides `questions.path`.
        #[arg(long)]
        questions: Option<PathBuf>,

        /// Output path (CSV). Overrides `output.path`.
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        retrieval: RetrievalArgs,

        /// Progress on stderr. Defaults to `human` when stderr is a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Answer one question for one organization.
    ///
    /// Prints each selected sentence with its score, followed by the
    /// aggregated URLs, pages, and document metadata.
    Query {
        /// The question text.
        query: String,

        /// Organization name (the corpus directory name).
        #[arg(long)]
        org: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,
    },

    /// Show per-organization document and sentence counts.
    Corpus,

    /// Print the page-tagged sentences of a raw text file.
    ///
    /// Useful for checking how a document's page markers and punctuation
    /// will be segmented. Does not read the config file.
    Segment {
        /// File containing raw document text with page markers.
        file: PathBuf,
    },
}

impl RetrievalArgs {
    fn apply(&self, cfg: &mut Config) -> anyhow::Result<()> {
        if let Some(mode) = &self.mode {
            cfg.retrieval.mode = mode.clone();
        }
        if let Some(threshold) = self.threshold {
            cfg.retrieval.threshold = threshold;
        }
        if let Some(top_k) = self.top_k {
            cfg.retrieval.top_k = top_k;
        }
        config::validate(cfg)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Segment { file } = &cli.command {
        run_segment(file)?;
        return Ok(());
    }

    // Validated after CLI overrides are applied
    let mut cfg = config::read_config(&cli.config)?;

    match cli.command {
        Commands::Run {
            questions,
            output,
            retrieval,
            progress,
        } => {
            if let Some(path) = questions {
                cfg.questions.path = path;
            }
            if let Some(path) = output {
                cfg.output.path = path;
            }
            retrieval.apply(&mut cfg)?;

            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();
            pipeline::run(&cfg, reporter.as_ref()).await?;
        }
        Commands::Query {
            query,
            org,
            retrieval,
        } => {
            retrieval.apply(&mut cfg)?;
            let params = RetrievalParams::from_config(&cfg.retrieval)?;
            let reporter = ProgressMode::default_for_tty().reporter();
            pipeline::run_query(&cfg, &query, &org, &params, reporter.as_ref()).await?;
        }
        Commands::Corpus => {
            stats::run_corpus_stats(&cfg)?;
        }
        Commands::Segment { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

fn run_segment(path: &std::path::Path) -> anyhow::Result<()> {
    use anyhow::Context;

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut count = 0usize;
    for block in split_pages(&raw) {
        for sentence in split_sentences(block.text) {
            println!("[Page {}] {}", block.page, sentence);
            count += 1;
        }
    }

    if count == 0 {
        eprintln!("Warning: no page markers found in {}", path.display());
    }
    Ok(())
}
