//! Keyword extraction and matching for `mode = "keyword"`.
//!
//! A lightweight alternative to semantic retrieval that needs no encoder:
//! the question is reduced to a handful of content words and every
//! candidate sentence containing one of them is a match.

use std::collections::HashSet;

/// Minimum keyword length in characters.
const MIN_KEYWORD_LEN: usize = 3;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "may", "me", "might", "more", "most", "must", "my", "myself", "no", "nor",
    "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves",
    "out", "over", "own", "same", "shall", "she", "should", "so", "some", "such", "than", "that",
    "the", "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this",
    "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you",
    "your", "yours", "yourself", "yourselves", "yes", "per", "via", "within", "without",
    "organisation", "organization", "company",
];

/// Split text into lower-cased alphanumeric word tokens.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Extract up to `limit` distinct keywords from a question, in first-seen order.
pub fn extract_keywords(question: &str, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for token in tokenize(question) {
        if out.len() >= limit {
            break;
        }
        if token.chars().count() < MIN_KEYWORD_LEN
            || is_stop_word(&token)
            || token.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }
        if seen.insert(token.clone()) {
            out.push(token);
        }
    }
    out
}

/// True when `sentence` contains any keyword, case-insensitively.
pub fn matches_any(sentence: &str, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return false;
    }
    let lowered = sentence.to_lowercase();
    keywords.iter().any(|k| lowered.contains(k.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        let tokens: Vec<String> = tokenize("Scope-1 emissions, (tCO2e)!").collect();
        assert_eq!(tokens, vec!["scope", "1", "emissions", "tco2e"]);
    }

    #[test]
    fn test_extract_keywords_drops_stop_words() {
        let kws = extract_keywords(
            "Does the organization disclose its gender pay gap and gender targets?",
            6,
        );
        assert_eq!(kws, vec!["disclose", "gender", "pay", "gap", "targets"]);
    }

    #[test]
    fn test_extract_keywords_limit() {
        let kws = extract_keywords("alpha beta gamma delta epsilon zeta eta theta", 3);
        assert_eq!(kws, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_extract_keywords_skips_numbers() {
        assert_eq!(extract_keywords("Goal 2030 water", 6), vec!["goal", "water"]);
    }

    #[test]
    fn test_matches_any_case_insensitive() {
        let kws = vec!["renewable".to_string()];
        assert!(matches_any("Renewable electricity reached 40%.", &kws));
        assert!(!matches_any("Coal use fell.", &kws));
        assert!(!matches_any("Anything.", &[]));
    }
}
