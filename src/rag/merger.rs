// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Merging per-backend results into one ranked context
//!
//! Only `Success` results contribute. Scores are normalized per backend,
//! duplicates collapse by content fingerprint, and the ordering is total so
//! that merging the same input twice yields the same context.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use super::keywords::normalize_text;
use super::types::{BackendKind, BackendResult, BackendResults, ContextFragment, RagContext};

/// Default cap on fragments in a merged context
pub const DEFAULT_MAX_FRAGMENTS: usize = 20;

/// How one backend's scores are mapped onto [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreNormalization {
    /// Pass through when every score is already in [0, 1], otherwise min-max
    #[default]
    Auto,
    /// Backend guarantees [0, 1]; values are only clamped
    PassThrough,
    /// Always rescale so the best hit is 1.0 and the worst 0.0
    MinMax,
}

/// Normalization choice per backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationPolicy {
    pub vector: ScoreNormalization,
    pub graph: ScoreNormalization,
    pub relational: ScoreNormalization,
}

impl NormalizationPolicy {
    pub fn for_backend(&self, kind: BackendKind) -> ScoreNormalization {
        match kind {
            BackendKind::Vector => self.vector,
            BackendKind::Graph => self.graph,
            BackendKind::Relational => self.relational,
        }
    }
}

/// Merge limits and policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub max_fragments: usize,
    /// Optional token budget for the whole context (about 4 chars per token)
    pub max_context_tokens: Option<usize>,
    pub normalization: NormalizationPolicy,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            max_fragments: DEFAULT_MAX_FRAGMENTS,
            max_context_tokens: None,
            normalization: NormalizationPolicy::default(),
        }
    }
}

impl MergeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_fragments == 0 {
            return Err("merge.max_fragments must be greater than 0".to_string());
        }
        if self.max_context_tokens == Some(0) {
            return Err("merge.max_context_tokens must be greater than 0 when set".to_string());
        }
        Ok(())
    }
}

/// Stable content fingerprint: hex SHA-256 of the normalized text
pub fn fingerprint(text: &str) -> String {
    digest_normalized(&normalize_text(text))
}

fn digest_normalized(normalized: &str) -> String {
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// Rough token estimate used for the context budget
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() / 4).max(1)
}

/// Map one backend's scores onto [0, 1]
pub fn normalize_scores(scores: &[f32], mode: ScoreNormalization) -> Vec<f32> {
    let in_unit_range = scores.iter().all(|s| (0.0..=1.0).contains(s));
    let mode = match mode {
        ScoreNormalization::Auto if in_unit_range => ScoreNormalization::PassThrough,
        ScoreNormalization::Auto => ScoreNormalization::MinMax,
        other => other,
    };

    match mode {
        ScoreNormalization::MinMax => {
            let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
            let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let range = max - min;
            if range <= f32::EPSILON {
                // All equal: every hit is as good as the best
                vec![1.0; scores.len()]
            } else {
                scores.iter().map(|s| (s - min) / range).collect()
            }
        }
        _ => scores.iter().map(|s| s.clamp(0.0, 1.0)).collect(),
    }
}

struct Candidate {
    fragment: ContextFragment,
    first_seen: usize,
}

fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.fragment
        .score
        .total_cmp(&a.fragment.score)
        .then_with(|| b.fragment.provenance.len().cmp(&a.fragment.provenance.len()))
        .then_with(|| a.fragment.provenance.first().cmp(&b.fragment.provenance.first()))
        .then_with(|| a.first_seen.cmp(&b.first_seen))
}

/// Combines backend results into a `RagContext`
#[derive(Debug, Clone, Default)]
pub struct ResultMerger {
    config: MergeConfig,
}

impl ResultMerger {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merge using the configured fragment cap
    pub fn merge(&self, results: &BackendResults) -> RagContext {
        self.merge_with_limit(results, self.config.max_fragments)
    }

    /// Merge, keeping at most `max_fragments` fragments
    pub fn merge_with_limit(&self, results: &BackendResults, max_fragments: usize) -> RagContext {
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (kind, result) in results {
            let fragments = match result {
                BackendResult::Success(fragments) => fragments,
                _ => continue,
            };

            let usable: Vec<_> = fragments.iter().filter(|f| f.score.is_finite()).collect();
            let raw: Vec<f32> = usable.iter().map(|f| f.score).collect();
            let scores = normalize_scores(&raw, self.config.normalization.for_backend(*kind));

            for (fragment, score) in usable.into_iter().zip(scores) {
                let normalized = normalize_text(&fragment.text);
                if normalized.is_empty() {
                    continue;
                }
                let fp = digest_normalized(&normalized);

                match index.get(&fp) {
                    Some(&i) => {
                        let existing = &mut candidates[i].fragment;
                        if score > existing.score {
                            existing.score = score;
                            existing.text = fragment.text.clone();
                        }
                        existing.provenance.insert(fragment.backend);
                    }
                    None => {
                        index.insert(fp.clone(), candidates.len());
                        candidates.push(Candidate {
                            fragment: ContextFragment {
                                text: fragment.text.clone(),
                                score,
                                provenance: BTreeSet::from([fragment.backend]),
                                fingerprint: fp,
                            },
                            first_seen: candidates.len(),
                        });
                    }
                }
            }
        }

        let unique = candidates.len();
        candidates.sort_by(rank);

        let mut fragments = Vec::new();
        let mut tokens = 0usize;
        for candidate in candidates.into_iter().take(max_fragments) {
            if let Some(budget) = self.config.max_context_tokens {
                let cost = estimate_tokens(&candidate.fragment.text);
                if tokens + cost > budget {
                    break;
                }
                tokens += cost;
            }
            fragments.push(candidate.fragment);
        }

        debug!(
            "Merged {} unique fragments from {} backends, kept {}",
            unique,
            results.values().filter(|r| r.is_success()).count(),
            fragments.len()
        );

        RagContext { fragments }
    }
}
