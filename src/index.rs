//! In-memory embedding index over the candidate table.
//!
//! The index holds one vector per candidate sentence, addressable by the
//! candidate's position in the session's candidate table, plus a
//! per-organization partition of those positions. It is built once per
//! session and read-only afterwards; the only mutable state is the query
//! cache, which memoizes query vectors by exact query text.
//!
//! Corpus encoding deduplicates identical sentence texts, so boilerplate
//! repeated across pages or documents is encoded once.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::EncodingFailure;
use crate::models::Candidate;
use crate::progress::{ProgressEvent, ProgressReporter};

/// Tuning knobs for building an [`EmbeddingIndex`].
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Number of distinct texts sent to the provider per call.
    pub batch_size: usize,
    /// Upper bound on a single query encoding call.
    pub query_timeout: Duration,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            batch_size: 64,
            query_timeout: Duration::from_secs(30),
        }
    }
}

pub struct EmbeddingIndex {
    vectors: Vec<Vec<f32>>,
    dims: usize,
    partitions: HashMap<String, Vec<usize>>,
    query_cache: Mutex<HashMap<String, Vec<f32>>>,
    query_timeout: Duration,
}

impl EmbeddingIndex {
    /// Build an index with organization partitions but no vectors.
    ///
    /// Used by keyword retrieval, which never scores by similarity.
    pub fn partitions_only(candidates: &[Candidate]) -> Self {
        Self {
            vectors: Vec::new(),
            dims: 0,
            partitions: build_partitions(candidates),
            query_cache: Mutex::new(HashMap::new()),
            query_timeout: IndexOptions::default().query_timeout,
        }
    }

    /// Encode every candidate sentence once.
    ///
    /// An empty candidate table yields an empty index. Any provider error,
    /// a wrong vector count, or inconsistent dimensionality is an
    /// [`EncodingFailure`] and invalidates the whole index.
    pub async fn encode_corpus(
        provider: &dyn EmbeddingProvider,
        candidates: &[Candidate],
        options: &IndexOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<Self> {
        let partitions = build_partitions(candidates);

        // Distinct texts in first-seen order, and each candidate's slot among them.
        let mut slot_of: HashMap<&str, usize> = HashMap::new();
        let mut distinct: Vec<String> = Vec::new();
        let mut slots = Vec::with_capacity(candidates.len());
        for c in candidates {
            let slot = *slot_of.entry(c.text.as_str()).or_insert_with(|| {
                distinct.push(c.text.clone());
                distinct.len() - 1
            });
            slots.push(slot);
        }

        let total = distinct.len() as u64;
        let mut dims = provider.dims();
        let mut encoded: Vec<Vec<f32>> = Vec::with_capacity(distinct.len());

        for batch in distinct.chunks(options.batch_size.max(1)) {
            let vectors = provider
                .embed(batch)
                .await
                .map_err(|e| unavailable(provider, &e))?;

            if vectors.len() != batch.len() {
                return Err(EncodingFailure::CountMismatch {
                    provider: provider.model_name().to_string(),
                    expected: batch.len(),
                    actual: vectors.len(),
                }
                .into());
            }

            for v in vectors {
                if dims == 0 {
                    dims = v.len();
                }
                check_dims(provider, dims, v.len())?;
                encoded.push(v);
            }

            progress.report(ProgressEvent::Encoding {
                n: encoded.len() as u64,
                total,
            });
        }

        let vectors = slots.into_iter().map(|s| encoded[s].clone()).collect();

        Ok(Self {
            vectors,
            dims,
            partitions,
            query_cache: Mutex::new(HashMap::new()),
            query_timeout: options.query_timeout,
        })
    }

    /// Encode a query, reusing the cached vector for a previously seen text.
    pub async fn encode_query(
        &self,
        provider: &dyn EmbeddingProvider,
        text: &str,
    ) -> Result<Vec<f32>> {
        if let Some(hit) = self.cache().get(text) {
            return Ok(hit.clone());
        }

        let v = match tokio::time::timeout(self.query_timeout, embed_query(provider, text)).await
        {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => return Err(unavailable(provider, &e).into()),
            Err(_) => {
                return Err(EncodingFailure::Timeout {
                    provider: provider.model_name().to_string(),
                    secs: self.query_timeout.as_secs(),
                }
                .into())
            }
        };

        let expected = if self.dims > 0 {
            self.dims
        } else {
            provider.dims()
        };
        if expected > 0 || v.is_empty() {
            check_dims(provider, expected.max(1), v.len())?;
        }

        self.cache().insert(text.to_string(), v.clone());
        Ok(v)
    }

    /// Candidate positions belonging to `organization`, in corpus order.
    pub fn partition(&self, organization: &str) -> &[usize] {
        self.partitions
            .get(organization)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn vector(&self, candidate: usize) -> Option<&[f32]> {
        self.vectors.get(candidate).map(Vec::as_slice)
    }

    /// Vector dimensionality, `0` for an empty or vectorless index.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Number of encoded candidates.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Organizations with at least one candidate, sorted.
    pub fn organizations(&self) -> Vec<&str> {
        let mut orgs: Vec<&str> = self.partitions.keys().map(String::as_str).collect();
        orgs.sort_unstable();
        orgs
    }

    pub fn cached_queries(&self) -> usize {
        self.cache().len()
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<f32>>> {
        // The cache only memoizes; a poisoned lock still holds valid vectors.
        self.query_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn build_partitions(candidates: &[Candidate]) -> HashMap<String, Vec<usize>> {
    let mut partitions: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, c) in candidates.iter().enumerate() {
        partitions.entry(c.organization.clone()).or_default().push(i);
    }
    partitions
}

fn unavailable(provider: &dyn EmbeddingProvider, err: &anyhow::Error) -> EncodingFailure {
    EncodingFailure::Unavailable {
        provider: provider.model_name().to_string(),
        reason: format!("{:#}", err),
    }
}

fn check_dims(provider: &dyn EmbeddingProvider, expected: usize, actual: usize) -> Result<()> {
    if actual == 0 || actual != expected {
        return Err(EncodingFailure::DimensionMismatch {
            provider: provider.model_name().to_string(),
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{DisabledProvider, HashProvider};
    use crate::models::DocumentType;
    use crate::progress::NoProgress;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cand(org: &str, text: &str) -> Candidate {
        Candidate {
            organization: org.into(),
            url: String::new(),
            page: "1".into(),
            document_type: DocumentType::Html,
            publication_date: None,
            collected: String::new(),
            text: text.into(),
        }
    }

    /// Hash provider that counts how many texts it was asked to embed.
    struct CountingProvider {
        inner: HashProvider,
        texts: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            self.inner.dims()
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.texts.fetch_add(texts.len(), Ordering::SeqCst);
            self.inner.embed(texts).await
        }
    }

    /// Returns vectors whose length grows with each text.
    struct RaggedProvider;

    #[async_trait]
    impl EmbeddingProvider for RaggedProvider {
        fn model_name(&self) -> &str {
            "ragged"
        }
        fn dims(&self) -> usize {
            0
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .enumerate()
                .map(|(i, _)| vec![1.0; i + 1])
                .collect())
        }
    }

    /// Drops the last vector of every batch.
    struct ShortProvider;

    #[async_trait]
    impl EmbeddingProvider for ShortProvider {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0, 0.0]; texts.len().saturating_sub(1)])
        }
    }

    #[tokio::test]
    async fn test_empty_corpus_is_empty_index() {
        let index = EmbeddingIndex::encode_corpus(
            &HashProvider::new(8),
            &[],
            &IndexOptions::default(),
            &NoProgress,
        )
        .await
        .unwrap();
        assert!(index.is_empty());
        assert!(index.partition("Acme").is_empty());
    }

    #[tokio::test]
    async fn test_vectors_parallel_to_candidates() {
        let cands = vec![
            cand("Acme", "Water use fell."),
            cand("Beta", "Energy use rose."),
            cand("Acme", "Water use fell."),
        ];
        let provider = CountingProvider {
            inner: HashProvider::new(16),
            texts: AtomicUsize::new(0),
        };
        let index = EmbeddingIndex::encode_corpus(
            &provider,
            &cands,
            &IndexOptions {
                batch_size: 1,
                ..IndexOptions::default()
            },
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.dims(), 16);
        // Duplicate text encoded once.
        assert_eq!(provider.texts.load(Ordering::SeqCst), 2);
        assert_eq!(index.vector(0), index.vector(2));
        assert_eq!(index.partition("Acme"), &[0, 2]);
        assert_eq!(index.partition("Beta"), &[1]);
        assert_eq!(index.organizations(), vec!["Acme", "Beta"]);
    }

    #[tokio::test]
    async fn test_query_cache_avoids_reencoding() {
        let provider = CountingProvider {
            inner: HashProvider::new(16),
            texts: AtomicUsize::new(0),
        };
        let index = EmbeddingIndex::encode_corpus(
            &provider,
            &[cand("Acme", "Hello there.")],
            &IndexOptions::default(),
            &NoProgress,
        )
        .await
        .unwrap();
        let before = provider.texts.load(Ordering::SeqCst);

        let a = index.encode_query(&provider, "water targets").await.unwrap();
        let b = index.encode_query(&provider, "water targets").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(provider.texts.load(Ordering::SeqCst), before + 1);
        assert_eq!(index.cached_queries(), 1);
    }

    #[tokio::test]
    async fn test_disabled_provider_is_encoding_failure() {
        let err = EmbeddingIndex::encode_corpus(
            &DisabledProvider,
            &[cand("Acme", "Hello.")],
            &IndexOptions::default(),
            &NoProgress,
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(
            err.downcast_ref::<EncodingFailure>(),
            Some(EncodingFailure::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_inconsistent_dims_is_encoding_failure() {
        let err = EmbeddingIndex::encode_corpus(
            &RaggedProvider,
            &[cand("Acme", "One."), cand("Acme", "Two.")],
            &IndexOptions::default(),
            &NoProgress,
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(
            err.downcast_ref::<EncodingFailure>(),
            Some(EncodingFailure::DimensionMismatch {
                expected: 1,
                actual: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_wrong_vector_count_is_encoding_failure() {
        let err = EmbeddingIndex::encode_corpus(
            &ShortProvider,
            &[cand("Acme", "One."), cand("Acme", "Two."), cand("Acme", "Three.")],
            &IndexOptions::default(),
            &NoProgress,
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(
            err.downcast_ref::<EncodingFailure>(),
            Some(EncodingFailure::CountMismatch {
                expected: 3,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_partitions_only() {
        let index = EmbeddingIndex::partitions_only(&[cand("Acme", "A."), cand("Acme", "B.")]);
        assert_eq!(index.partition("Acme"), &[0, 1]);
        assert!(index.is_empty());
        assert_eq!(index.vector(0), None);
    }
}
