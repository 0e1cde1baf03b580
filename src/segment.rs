//! Page and sentence segmenter.
//!
//! Scraped documents carry their pagination inline as `===== PAGE <n> =====`
//! markers. Segmentation splits a document's raw content on those markers,
//! then splits each page into sentences, and emits one [`Candidate`] per
//! sentence carrying the document's provenance.
//!
//! Text before the first marker is discarded, so a document without any
//! markers contributes no candidates. Segmentation never fails.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{Candidate, DocumentRecord};

const PAGE_MARKER: &str = r"===== PAGE (\d+) =====";

fn page_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PAGE_MARKER).expect("page marker pattern is valid"))
}

/// Text of one page, tagged with its page number as written in the marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBlock<'a> {
    pub page: &'a str,
    pub text: &'a str,
}

/// Split raw content into page blocks. The preamble before the first marker
/// is dropped.
pub fn split_pages(raw: &str) -> Vec<PageBlock<'_>> {
    let markers: Vec<_> = page_marker().captures_iter(raw).collect();
    let mut pages = Vec::with_capacity(markers.len());

    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(num)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(raw.len());
        pages.push(PageBlock {
            page: num.as_str(),
            text: &raw[whole.end()..end],
        });
    }

    pages
}

/// Split text into sentences after any `.`, `!` or `?` followed by
/// whitespace. Punctuation stays with the preceding sentence; results are
/// trimmed and empty pieces dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next_idx, next)) = chars.peek() {
            if next.is_whitespace() {
                pieces.push(&text[start..next_idx]);
                start = next_idx;
            }
        }
    }
    pieces.push(&text[start..]);

    pieces
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Produce the candidate sentences for one document.
pub fn segment_document(doc: &DocumentRecord) -> Vec<Candidate> {
    let mut out = Vec::new();
    for block in split_pages(&doc.raw_content) {
        for sentence in split_sentences(block.text) {
            out.push(Candidate {
                organization: doc.organization.clone(),
                url: doc.url.clone(),
                page: block.page.to_string(),
                document_type: doc.document_type,
                publication_date: doc.publication_date,
                collected: doc.collected.clone(),
                text: sentence.to_string(),
            });
        }
    }
    out
}

/// Candidates for a whole corpus.
#[derive(Debug, Default)]
pub struct Segmented {
    /// Every candidate, in document order.
    pub candidates: Vec<Candidate>,
    /// Number of candidates each document produced, parallel to the input.
    pub sentence_counts: Vec<usize>,
}

/// Segment every document, preserving document order.
pub fn segment_corpus(docs: &[DocumentRecord]) -> Segmented {
    let mut out = Segmented {
        candidates: Vec::new(),
        sentence_counts: Vec::with_capacity(docs.len()),
    };
    for doc in docs {
        let sentences = segment_document(doc);
        out.sentence_counts.push(sentences.len());
        out.candidates.extend(sentences);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;

    fn doc(raw: &str) -> DocumentRecord {
        DocumentRecord {
            organization: "Acme".into(),
            url: "https://acme.example/report.pdf".into(),
            raw_content: raw.into(),
            document_type: DocumentType::Pdf,
            publication_date: None,
            collected: "2024-05-01".into(),
        }
    }

    #[test]
    fn test_two_page_document() {
        let d = doc("===== PAGE 1 ===== Water use fell. Energy use rose. ===== PAGE 2 ===== Waste declined.");
        let cands = segment_document(&d);
        let got: Vec<(&str, &str)> = cands
            .iter()
            .map(|c| (c.page.as_str(), c.text.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("1", "Water use fell."),
                ("1", "Energy use rose."),
                ("2", "Waste declined."),
            ]
        );
        assert!(cands.iter().all(|c| c.organization == "Acme"));
        assert!(cands.iter().all(|c| c.collected == "2024-05-01"));
    }

    #[test]
    fn test_preamble_discarded() {
        let pages = split_pages("Cover text. ===== PAGE 4 ===== Body.");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page, "4");
        assert_eq!(pages[0].text.trim(), "Body.");
    }

    #[test]
    fn test_no_markers_yields_nothing() {
        assert!(segment_document(&doc("Just some text. No pages here.")).is_empty());
        assert!(segment_document(&doc("")).is_empty());
    }

    #[test]
    fn test_empty_page_contributes_nothing() {
        let cands = segment_document(&doc("===== PAGE 1 =====   ===== PAGE 2 ===== Hi."));
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].page, "2");
    }

    #[test]
    fn test_sentence_boundaries() {
        assert_eq!(
            split_sentences("Is it? Yes! It is.\nNext line."),
            vec!["Is it?", "Yes!", "It is.", "Next line."]
        );
    }

    #[test]
    fn test_no_special_casing_of_abbreviations() {
        assert_eq!(
            split_sentences("Revenue rose 3.5 percent vs. last year."),
            vec!["Revenue rose 3.5 percent vs.", "last year."]
        );
    }

    #[test]
    fn test_trailing_text_without_punctuation() {
        assert_eq!(
            split_sentences("  First.   trailing words  "),
            vec!["First.", "trailing words"]
        );
    }

    #[test]
    fn test_round_trip_reconstructs_page_text() {
        let raw = "intro ===== PAGE 1 =====  Alpha beta. Gamma?\n\nDelta!  ===== PAGE 12 ===== Epsilon 2.5 zeta. eta";
        let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");

        for block in split_pages(raw) {
            let rebuilt = split_sentences(block.text).join(" ");
            assert_eq!(normalize(&rebuilt), normalize(block.text));
        }
    }

    #[test]
    fn test_segment_corpus_counts_per_document() {
        let docs = [
            doc("===== PAGE 1 ===== A. B."),
            doc("no markers"),
            doc("===== PAGE 2 ===== C."),
        ];
        let segmented = segment_corpus(&docs);
        assert_eq!(segmented.sentence_counts, vec![2, 0, 1]);
        let texts: Vec<&str> = segmented.candidates.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["A.", "B.", "C."]);
    }

    #[test]
    fn test_deterministic() {
        let d = doc("===== PAGE 1 ===== A. B. C.");
        assert_eq!(segment_document(&d), segment_document(&d));
    }
}
