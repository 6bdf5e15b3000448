// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Keyword extraction from natural-language queries
//!
//! Heuristic and allocation-light. Used to derive graph traversal seeds,
//! relational predicates and offline embeddings from the same query text.

/// Words that carry no retrieval signal on their own
const STOPWORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "as", "at", "be", "been", "but", "by", "can",
    "could", "did", "do", "does", "for", "from", "had", "has", "have", "how", "i", "if", "in",
    "into", "is", "it", "its", "me", "my", "of", "on", "or", "please", "should", "so", "tell",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "to", "was",
    "we", "were", "what", "when", "where", "which", "who", "whom", "why", "will", "with", "would",
    "you", "your",
];

/// Lowercase the text and collapse every run of whitespace to one space
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split into lowercase alphanumeric tokens
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Extract up to `max_keywords` distinct keywords, preserving query order
///
/// Stopwords and single-character tokens are dropped.
pub fn extract_keywords(text: &str, max_keywords: usize) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();

    for token in tokenize(text) {
        if keywords.len() >= max_keywords {
            break;
        }
        if token.chars().count() < 2 || STOPWORDS.contains(&token.as_str()) {
            continue;
        }
        if !keywords.contains(&token) {
            keywords.push(token);
        }
    }

    keywords
}
