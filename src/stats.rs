//! Corpus statistics and health overview.
//!
//! Provides a quick summary of what the retrieval engine will see: document
//! and candidate counts per organization, how many documents produced no
//! sentences (usually missing page markers), and date coverage. Used by
//! `evh corpus` to check a scrape before running the full pipeline.

use anyhow::Result;
use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::config::Config;
use crate::models::{format_date, DocumentRecord};
use crate::pipeline::load_and_segment;
use crate::progress::NoProgress;

/// Per-organization breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationStats {
    pub organization: String,
    pub documents: usize,
    pub candidates: usize,
    /// Documents that yielded zero candidate sentences.
    pub empty_documents: usize,
    pub dated_documents: usize,
    pub latest_publication: Option<NaiveDate>,
}

/// Compute per-organization stats, sorted by organization name.
///
/// `sentence_counts[i]` is the number of candidates `documents[i]` produced.
pub fn organization_stats(
    documents: &[DocumentRecord],
    sentence_counts: &[usize],
) -> Vec<OrganizationStats> {
    let mut by_org: BTreeMap<&str, OrganizationStats> = BTreeMap::new();

    for (doc, &sentences) in documents.iter().zip(sentence_counts) {
        let s = by_org
            .entry(doc.organization.as_str())
            .or_insert_with(|| OrganizationStats {
                organization: doc.organization.clone(),
                ..Default::default()
            });
        s.documents += 1;
        if doc.publication_date.is_some() {
            s.dated_documents += 1;
            s.latest_publication = s.latest_publication.max(doc.publication_date);
        }
        s.candidates += sentences;
        if sentences == 0 {
            s.empty_documents += 1;
        }
    }

    by_org.into_values().collect()
}

/// Run the corpus command: load and segment, then print a summary.
pub fn run_corpus_stats(config: &Config) -> Result<()> {
    let corpus = load_and_segment(config, &NoProgress)?;
    let stats = organization_stats(&corpus.documents, &corpus.sentence_counts);

    println!("Evidence Harness: Corpus Stats");
    println!("===============================");
    println!();
    println!("  Root:          {}", config.corpus.root.display());
    println!("  Files:         {}", corpus.files_loaded);
    if corpus.files_skipped > 0 {
        println!("  Skipped:       {}", corpus.files_skipped);
    }
    println!("  Organizations: {}", stats.len());
    println!("  Documents:     {}", corpus.documents.len());
    println!("  Sentences:     {}", corpus.candidates.len());

    if !stats.is_empty() {
        println!();
        println!("  By organization:");
        println!(
            "  {:<32} {:>6} {:>9} {:>7} {:>7}   {}",
            "ORGANIZATION", "DOCS", "SENTENCES", "EMPTY", "DATED", "LATEST"
        );
        println!("  {}", "-".repeat(84));

        for s in &stats {
            let latest = match s.latest_publication {
                Some(_) => format_date(s.latest_publication),
                None => "-".to_string(),
            };
            println!(
                "  {:<32} {:>6} {:>9} {:>7} {:>7}   {}",
                s.organization,
                s.documents,
                s.candidates,
                s.empty_documents,
                s.dated_documents,
                latest
            );
        }
    }

    println!();
    Ok(())
}
