// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Result merger tests

use fabstir_rag_node::rag::merger::{fingerprint, MergeConfig, NormalizationPolicy, ScoreNormalization};
use fabstir_rag_node::rag::{BackendKind, BackendResult, BackendResults, ErrorKind, ResultMerger, ScoredFragment};
use std::collections::HashSet;

/// Deterministic result maps with overlapping texts and mixed score scales
fn generated_results(seed: u64) -> BackendResults {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as u32
    };

    let mut results = BackendResults::new();
    for kind in BackendKind::ALL {
        let scale = if kind == BackendKind::Graph { 5.0 } else { 1.0 };
        let count = next() % 8;
        let fragments = (0..count)
            .map(|_| {
                let doc = next() % 6;
                let text = if next() % 2 == 0 {
                    format!("Document {}", doc)
                } else {
                    format!("  document   {} ", doc)
                };
                let score = (next() % 1000) as f32 / 1000.0 * scale;
                ScoredFragment::new(text, score, kind)
            })
            .collect();
        results.insert(kind, BackendResult::Success(fragments));
    }
    results
}

#[test]
fn test_no_duplicate_fingerprints() {
    let merger = ResultMerger::default();
    for seed in 0..50 {
        let context = merger.merge(&generated_results(seed));
        let unique: HashSet<_> = context.fragments.iter().map(|f| f.fingerprint.clone()).collect();
        assert_eq!(unique.len(), context.len(), "seed {}", seed);
    }
}

#[test]
fn test_scores_normalized_and_sorted() {
    let merger = ResultMerger::default();
    for seed in 0..50 {
        let context = merger.merge(&generated_results(seed));
        for fragment in &context.fragments {
            assert!((0.0..=1.0).contains(&fragment.score), "seed {}", seed);
            assert!(!fragment.provenance.is_empty());
            assert_eq!(fragment.fingerprint, fingerprint(&fragment.text));
        }
        for pair in context.fragments.windows(2) {
            assert!(pair[0].score >= pair[1].score, "seed {}", seed);
        }
    }
}

#[test]
fn test_merge_is_idempotent() {
    let merger = ResultMerger::default();
    for seed in 0..50 {
        let results = generated_results(seed);
        assert_eq!(merger.merge(&results), merger.merge(&results), "seed {}", seed);
    }
}

#[test]
fn test_all_non_success_yields_empty_context() {
    let mut results = BackendResults::new();
    results.insert(BackendKind::Vector, BackendResult::Timeout);
    results.insert(
        BackendKind::Graph,
        BackendResult::failure(ErrorKind::BackendRejected, "auth failed"),
    );
    results.insert(
        BackendKind::Relational,
        BackendResult::failure(ErrorKind::Unavailable, "no adapter"),
    );

    assert!(ResultMerger::default().merge(&results).is_empty());
    assert!(ResultMerger::default().merge(&BackendResults::new()).is_empty());
}

#[test]
fn test_large_scale_backend_does_not_dominate() {
    let mut results = BackendResults::new();
    results.insert(
        BackendKind::Graph,
        BackendResult::Success(vec![
            ScoredFragment::new("graph best", 40.0, BackendKind::Graph),
            ScoredFragment::new("graph worst", 10.0, BackendKind::Graph),
        ]),
    );
    results.insert(
        BackendKind::Vector,
        BackendResult::Success(vec![ScoredFragment::new("vector best", 0.95, BackendKind::Vector)]),
    );

    let context = ResultMerger::default().merge(&results);
    assert_eq!(context.fragments[0].score, 1.0);
    assert_eq!(context.fragments[0].text, "graph best");
    assert_eq!(context.fragments[1].text, "vector best");
    assert_eq!(context.fragments[2].score, 0.0);
}

#[test]
fn test_configured_normalization_per_backend() {
    let mut results = BackendResults::new();
    results.insert(
        BackendKind::Relational,
        BackendResult::Success(vec![
            ScoredFragment::new("half match", 0.5, BackendKind::Relational),
            ScoredFragment::new("quarter match", 0.25, BackendKind::Relational),
        ]),
    );

    let merger = ResultMerger::new(MergeConfig {
        normalization: NormalizationPolicy {
            relational: ScoreNormalization::MinMax,
            ..Default::default()
        },
        ..Default::default()
    });
    let context = merger.merge(&results);
    assert_eq!(context.fragments[0].score, 1.0);
    assert_eq!(context.fragments[1].score, 0.0);
}

#[test]
fn test_truncation_happens_after_sorting() {
    let mut results = BackendResults::new();
    results.insert(
        BackendKind::Relational,
        BackendResult::Success(vec![ScoredFragment::new("relational", 0.8, BackendKind::Relational)]),
    );
    results.insert(
        BackendKind::Vector,
        BackendResult::Success(vec![ScoredFragment::new("vector", 0.3, BackendKind::Vector)]),
    );

    let context = ResultMerger::default().merge_with_limit(&results, 1);
    assert_eq!(context.len(), 1);
    assert_eq!(context.fragments[0].text, "relational");
}
