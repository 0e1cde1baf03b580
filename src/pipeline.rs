//! End-to-end run: load, segment, encode, retrieve, write.
//!
//! ```text
//! questions.csv ──────────────────────────────────┐
//!                                                 ▼
//! corpus/*/content.csv ─▶ load ─▶ segment ─▶ session ─▶ answer_all ─▶ output.csv
//! ```
//!
//! The question table is read before the corpus so a schema error surfaces
//! before any encoding work. Nothing is written unless every row was
//! answered; an encoder failure leaves any previous output untouched.

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::aggregate::{answer_all, AugmentedTable};
use crate::config::Config;
use crate::embedding::{create_provider, DisabledProvider, EmbeddingProvider};
use crate::index::IndexOptions;
use crate::loader::load_corpus;
use crate::models::{format_date, Candidate, DocumentRecord};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::questions::QuestionTable;
use crate::retrieval::{RetrievalMode, RetrievalParams, RetrievalSession, SessionOptions};
use crate::segment::segment_corpus;

/// Loaded and segmented corpus.
#[derive(Debug, Default)]
pub struct Corpus {
    pub documents: Vec<DocumentRecord>,
    pub candidates: Vec<Candidate>,
    /// Candidates per document, parallel to `documents`.
    pub sentence_counts: Vec<usize>,
    pub files_loaded: usize,
    pub files_skipped: usize,
}

/// Counts reported at the end of `evh run`.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub mode: RetrievalMode,
    pub questions: usize,
    pub organizations: usize,
    pub documents: usize,
    pub candidates: usize,
    pub rows_written: usize,
    pub blank_rows: usize,
    pub files_skipped: usize,
    pub output: PathBuf,
}

pub fn load_and_segment(config: &Config, progress: &dyn ProgressReporter) -> Result<Corpus> {
    let report = load_corpus(&config.corpus)?;
    progress.report(ProgressEvent::Loading {
        files: report.files_loaded as u64,
    });

    progress.report(ProgressEvent::Segmenting {
        documents: report.documents.len() as u64,
    });
    let segmented = segment_corpus(&report.documents);

    Ok(Corpus {
        documents: report.documents,
        candidates: segmented.candidates,
        sentence_counts: segmented.sentence_counts,
        files_loaded: report.files_loaded,
        files_skipped: report.files_skipped.len(),
    })
}

/// Build a session for `mode`. Keyword sessions never touch an encoder.
pub async fn open_session(
    config: &Config,
    candidates: Vec<Candidate>,
    mode: RetrievalMode,
    progress: &dyn ProgressReporter,
) -> Result<RetrievalSession> {
    let (provider, encode): (Box<dyn EmbeddingProvider>, bool) = match mode {
        RetrievalMode::Keyword => (Box::new(DisabledProvider), false),
        RetrievalMode::Semantic => (create_provider(&config.embedding)?, true),
    };

    let options = SessionOptions {
        index: IndexOptions {
            batch_size: config.embedding.batch_size,
            query_timeout: Duration::from_secs(config.embedding.timeout_secs),
        },
        encode,
    };

    RetrievalSession::build(provider, candidates, &options, progress).await
}

/// Run the full pipeline and write the augmented question table.
pub async fn run_pipeline(config: &Config, progress: &dyn ProgressReporter) -> Result<RunSummary> {
    let params = RetrievalParams::from_config(&config.retrieval)?;
    let table = QuestionTable::load(&config.questions)?;

    let corpus = load_and_segment(config, progress)?;
    let documents = corpus.documents.len();
    let candidates = corpus.candidates.len();

    let session = open_session(config, corpus.candidates, params.mode, progress).await?;
    let outputs = answer_all(&session, &table, &params, progress).await?;

    let augmented = AugmentedTable::build(&table, &outputs)?;
    augmented.write_csv(&config.output.path)?;

    Ok(RunSummary {
        mode: params.mode,
        questions: table.len(),
        organizations: session.organizations().len(),
        documents,
        candidates,
        rows_written: augmented.rows.len(),
        blank_rows: outputs.iter().filter(|o| o.is_blank()).count(),
        files_skipped: corpus.files_skipped,
        output: config.output.path.clone(),
    })
}

/// `evh run`: run the pipeline and print a summary to stdout.
pub async fn run(config: &Config, progress: &dyn ProgressReporter) -> Result<()> {
    let summary = run_pipeline(config, progress).await?;

    println!("run ({})", summary.mode);
    println!("  questions: {}", summary.questions);
    println!("  organizations: {}", summary.organizations);
    println!("  documents: {}", summary.documents);
    println!("  candidate sentences: {}", summary.candidates);
    if summary.files_skipped > 0 {
        println!("  skipped files: {}", summary.files_skipped);
    }
    println!("  rows written: {}", summary.rows_written);
    println!("  rows without evidence: {}", summary.blank_rows);
    println!("  output: {}", summary.output.display());
    println!("ok");
    Ok(())
}

/// `evh query`: answer one question for one organization and print the matches.
pub async fn run_query(
    config: &Config,
    query: &str,
    organization: &str,
    params: &RetrievalParams,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let corpus = load_and_segment(config, progress)?;
    let session = open_session(config, corpus.candidates, params.mode, progress).await?;
    let result = session.retrieve(query, organization, params).await?;

    if result.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, m) in result.matches.iter().enumerate() {
        println!("{}. [{:.2}] {}", i + 1, m.score, m.candidate.formatted());
        if !m.candidate.url.is_empty() {
            println!("    url: {}", m.candidate.url);
        }
        println!(
            "    type: {}  published: {}",
            m.candidate.document_type,
            format_date(m.candidate.publication_date)
        );
    }
    println!();
    println!("selection: {:?}", result.selection);
    println!("urls: {}", result.joined_urls());
    println!("pages: {}", result.joined_pages());
    println!("document type: {}", result.document_type_label());
    println!("publication date: {}", result.publication_date_label());
    println!("last updated: {}", result.collected_label());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Config) {
        let tmp = TempDir::new().unwrap();
        let org = tmp.path().join("corpus").join("Acme");
        fs::create_dir_all(&org).unwrap();
        fs::write(
            org.join("content.csv"),
            "Organization,URL,Raw Content,File Type,Publication Date,Date Collected\n\
             Acme,https://acme.test/r.pdf,\"===== PAGE 1 ===== Water use fell. Energy use rose.\",PDF,2023-05-01,2024-01-02\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("questions.csv"),
            "Organization,SDG Question\nAcme,water use\nNobody,water use\n",
        )
        .unwrap();

        let mut cfg = Config::minimal();
        cfg.corpus.root = tmp.path().join("corpus");
        cfg.questions.path = tmp.path().join("questions.csv");
        cfg.output.path = tmp.path().join("answers.csv");
        (tmp, cfg)
    }

    #[tokio::test]
    async fn test_run_pipeline_semantic() {
        let (_tmp, cfg) = fixture();
        let summary = run_pipeline(&cfg, &NoProgress).await.unwrap();

        assert_eq!(summary.questions, 2);
        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.blank_rows, 1);
        assert_eq!(summary.organizations, 1);
        assert_eq!(summary.candidates, 2);

        let text = fs::read_to_string(&cfg.output.path).unwrap();
        assert!(text.contains("[Page 1] Water use fell."));
        assert!(text.lines().nth(2).unwrap().starts_with("Nobody,water use,,,,,,"));
    }

    #[tokio::test]
    async fn test_run_pipeline_keyword() {
        let (_tmp, mut cfg) = fixture();
        cfg.retrieval.mode = "keyword".to_string();
        cfg.embedding.provider = "disabled".to_string();

        let summary = run_pipeline(&cfg, &NoProgress).await.unwrap();
        assert_eq!(summary.mode, RetrievalMode::Keyword);
        assert_eq!(summary.blank_rows, 1);

        let text = fs::read_to_string(&cfg.output.path).unwrap();
        assert!(text.contains("[Page 1] Water use fell. | [Page 1] Energy use rose."));
    }

    #[tokio::test]
    async fn test_missing_question_column_writes_nothing() {
        let (tmp, mut cfg) = fixture();
        fs::write(tmp.path().join("bad.csv"), "Company,Prompt\nAcme,x\n").unwrap();
        cfg.questions.path = tmp.path().join("bad.csv");

        assert!(run_pipeline(&cfg, &NoProgress).await.is_err());
        assert!(!cfg.output.path.exists());
    }
}
