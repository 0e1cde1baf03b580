//! Per-organization sentence retrieval.
//!
//! A [`RetrievalSession`] owns the candidate table, its [`EmbeddingIndex`]
//! and the embedding provider. Each call to [`RetrievalSession::retrieve`]
//! answers one (question, organization) pair:
//!
//! ```text
//! organization ──▶ partition ──▶ score ──▶ select ──▶ RetrievalResult
//!                     │           (cosine   (threshold, top_k,
//!                     ▼            or        fallback)
//!                 empty result     keyword)
//! ```
//!
//! # Selection
//!
//! In semantic mode a candidate passes when its cosine similarity is
//! `>= threshold`. Passing candidates are ranked by descending score, then
//! ascending candidate index, and truncated to `top_k`. When nothing passes
//! but the organization has candidates, the single best candidate is
//! returned instead, so every known organization yields at least one match.
//!
//! Keyword mode returns every candidate, in corpus order, whose document is
//! dated and whose sentence contains one of the question's keywords. There is
//! no fallback in keyword mode.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::config::RetrievalConfig;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::index::{EmbeddingIndex, IndexOptions};
use crate::keyword::{extract_keywords, matches_any};
use crate::models::{format_date, Candidate, DocumentType};
use crate::progress::ProgressReporter;

/// Separator used when joining sentences, URLs and pages into one cell.
pub const JOIN_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    Semantic,
    Keyword,
}

impl FromStr for RetrievalMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "semantic" => Ok(RetrievalMode::Semantic),
            "keyword" => Ok(RetrievalMode::Keyword),
            other => bail!(
                "Unknown retrieval mode: '{}'. Must be semantic or keyword.",
                other
            ),
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalMode::Semantic => f.write_str("semantic"),
            RetrievalMode::Keyword => f.write_str("keyword"),
        }
    }
}

/// Per-query retrieval parameters.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    /// Minimum cosine similarity for a threshold pass. Default `0.4`.
    pub threshold: f32,
    /// Maximum number of threshold-pass matches. Default `8`.
    pub top_k: usize,
    pub mode: RetrievalMode,
    /// Maximum keywords taken from a question in keyword mode. Default `6`.
    pub keyword_count: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            top_k: 8,
            mode: RetrievalMode::Semantic,
            keyword_count: 6,
        }
    }
}

impl RetrievalParams {
    pub fn from_config(config: &RetrievalConfig) -> Result<Self> {
        Ok(Self {
            threshold: config.threshold,
            top_k: config.top_k,
            mode: config.mode.parse()?,
            keyword_count: config.keyword_count,
        })
    }
}

/// How a result's matches were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The organization has no candidates, or keyword mode found nothing.
    Empty,
    /// Every match cleared the similarity threshold.
    Threshold,
    /// Nothing cleared the threshold; the single best candidate was taken.
    Fallback,
    /// Keyword matches.
    Keyword,
}

/// One selected candidate and its score.
#[derive(Debug, Clone)]
pub struct Match<'a> {
    pub index: usize,
    pub candidate: &'a Candidate,
    pub score: f32,
}

/// Matches for one query plus their aggregated provenance.
#[derive(Debug, Clone)]
pub struct RetrievalResult<'a> {
    pub matches: Vec<Match<'a>>,
    pub selection: Selection,
    /// Distinct non-blank URLs in first-seen order.
    pub urls: Vec<String>,
    /// Distinct page numbers in first-seen order.
    pub pages: Vec<String>,
    /// Metadata of the first match, `None` when there are no matches.
    pub document_type: Option<DocumentType>,
    pub publication_date: Option<NaiveDate>,
    pub collected: Option<String>,
}

impl<'a> RetrievalResult<'a> {
    pub fn empty() -> Self {
        Self {
            matches: Vec::new(),
            selection: Selection::Empty,
            urls: Vec::new(),
            pages: Vec::new(),
            document_type: None,
            publication_date: None,
            collected: None,
        }
    }

    fn from_matches(matches: Vec<Match<'a>>, selection: Selection) -> Self {
        if matches.is_empty() {
            return Self::empty();
        }

        let mut seen_urls = HashSet::new();
        let mut seen_pages = HashSet::new();
        let mut urls = Vec::new();
        let mut pages = Vec::new();
        for m in &matches {
            let url = m.candidate.url.trim();
            if !url.is_empty() && seen_urls.insert(url) {
                urls.push(url.to_string());
            }
            if seen_pages.insert(m.candidate.page.as_str()) {
                pages.push(m.candidate.page.clone());
            }
        }

        let first = matches[0].candidate;
        let document_type = Some(first.document_type);
        let publication_date = first.publication_date;
        let collected = Some(first.collected.clone());

        Self {
            matches,
            selection,
            urls,
            pages,
            document_type,
            publication_date,
            collected,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Matches rendered as `"[Page <n>] <sentence>"`, in selection order.
    pub fn formatted(&self) -> Vec<String> {
        self.matches.iter().map(|m| m.candidate.formatted()).collect()
    }

    pub fn joined_content(&self) -> String {
        self.formatted().join(JOIN_SEPARATOR)
    }

    pub fn joined_urls(&self) -> String {
        self.urls.join(JOIN_SEPARATOR)
    }

    pub fn joined_pages(&self) -> String {
        self.pages.join(JOIN_SEPARATOR)
    }

    pub fn document_type_label(&self) -> String {
        self.document_type
            .map(|t| t.as_str().to_string())
            .unwrap_or_default()
    }

    pub fn publication_date_label(&self) -> String {
        format_date(self.publication_date)
    }

    pub fn collected_label(&self) -> String {
        self.collected.clone().unwrap_or_default()
    }
}

/// Choose matches from `(candidate index, score)` pairs.
///
/// Returns threshold passes ranked by descending score then ascending index,
/// capped at `top_k` (at least one). With no passes and a non-empty input,
/// returns the best-scoring pair as a fallback.
pub fn select(
    scored: &[(usize, f32)],
    threshold: f32,
    top_k: usize,
) -> (Vec<(usize, f32)>, Selection) {
    if scored.is_empty() {
        return (Vec::new(), Selection::Empty);
    }

    let mut passed: Vec<(usize, f32)> = scored
        .iter()
        .copied()
        .filter(|&(_, s)| s >= threshold)
        .collect();

    if passed.is_empty() {
        let best = scored
            .iter()
            .copied()
            .min_by(rank)
            .map(|b| vec![b])
            .unwrap_or_default();
        return (best, Selection::Fallback);
    }

    passed.sort_by(rank);
    passed.truncate(top_k.max(1));
    (passed, Selection::Threshold)
}

/// Descending score, then ascending index. NaN scores sort last.
fn rank(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    match (a.1.is_nan(), b.1.is_nan()) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal),
    }
    .then(a.0.cmp(&b.0))
}

/// Options for building a [`RetrievalSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub index: IndexOptions,
    /// Encode the corpus. Keyword-only sessions skip encoding entirely.
    pub encode: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            index: IndexOptions::default(),
            encode: true,
        }
    }
}

/// Shared state for answering many queries over one corpus.
pub struct RetrievalSession {
    candidates: Vec<Candidate>,
    index: EmbeddingIndex,
    provider: Box<dyn EmbeddingProvider>,
    encoded: bool,
}

impl RetrievalSession {
    /// Build a session, encoding every candidate once when `options.encode`.
    pub async fn build(
        provider: Box<dyn EmbeddingProvider>,
        candidates: Vec<Candidate>,
        options: &SessionOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<Self> {
        let index = if options.encode {
            EmbeddingIndex::encode_corpus(provider.as_ref(), &candidates, &options.index, progress)
                .await?
        } else {
            EmbeddingIndex::partitions_only(&candidates)
        };

        Ok(Self {
            candidates,
            index,
            provider,
            encoded: options.encode,
        })
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    /// Organizations with at least one candidate, sorted.
    pub fn organizations(&self) -> Vec<&str> {
        self.index.organizations()
    }

    /// Answer one query for one organization.
    ///
    /// An organization without candidates yields [`RetrievalResult::empty`].
    /// The only error is an encoder failure, which is fatal for the session.
    pub async fn retrieve(
        &self,
        query: &str,
        organization: &str,
        params: &RetrievalParams,
    ) -> Result<RetrievalResult<'_>> {
        let partition = self.index.partition(organization);
        if partition.is_empty() {
            return Ok(RetrievalResult::empty());
        }

        match params.mode {
            RetrievalMode::Keyword => Ok(self.retrieve_keyword(query, partition, params)),
            RetrievalMode::Semantic => self.retrieve_semantic(query, partition, params).await,
        }
    }

    async fn retrieve_semantic(
        &self,
        query: &str,
        partition: &[usize],
        params: &RetrievalParams,
    ) -> Result<RetrievalResult<'_>> {
        if !self.encoded {
            bail!("semantic retrieval requires a session built with embeddings");
        }

        let query_vec = self.index.encode_query(self.provider.as_ref(), query).await?;

        let scored: Vec<(usize, f32)> = partition
            .iter()
            .map(|&i| {
                let score = self
                    .index
                    .vector(i)
                    .map(|v| cosine_similarity(&query_vec, v))
                    .unwrap_or(0.0);
                (i, score)
            })
            .collect();

        let (chosen, selection) = select(&scored, params.threshold, params.top_k);
        let matches = chosen
            .into_iter()
            .map(|(index, score)| Match {
                index,
                candidate: &self.candidates[index],
                score,
            })
            .collect();

        Ok(RetrievalResult::from_matches(matches, selection))
    }

    fn retrieve_keyword(
        &self,
        query: &str,
        partition: &[usize],
        params: &RetrievalParams,
    ) -> RetrievalResult<'_> {
        let keywords = extract_keywords(query, params.keyword_count);

        let matches: Vec<Match<'_>> = partition
            .iter()
            .map(|&i| (i, &self.candidates[i]))
            .filter(|(_, c)| c.publication_date.is_some() && matches_any(&c.text, &keywords))
            .map(|(index, candidate)| Match {
                index,
                candidate,
                score: 1.0,
            })
            .collect();

        RetrievalResult::from_matches(matches, Selection::Keyword)
    }
}
