// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Fan-out orchestrator tests

use crate::common::ScriptedAdapter;
use fabstir_rag_node::rag::{
    BackendKind, BackendResult, ErrorKind, FanOutOrchestrator, RagError, SubQuery, SubQueryPayload,
};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::Instant;

fn sub_query(kind: BackendKind, timeout_ms: u64) -> SubQuery {
    let payload = match kind {
        BackendKind::Vector => SubQueryPayload::Vector {
            text: "capital of France".to_string(),
            top_k: 5,
        },
        BackendKind::Graph => SubQueryPayload::Graph {
            seeds: vec!["capital".to_string(), "france".to_string()],
            max_depth: 2,
            limit: 5,
        },
        BackendKind::Relational => SubQueryPayload::Relational {
            terms: vec!["capital".to_string(), "france".to_string()],
            limit: 5,
        },
    };
    SubQuery::new(payload, Duration::from_millis(timeout_ms))
}

#[tokio::test]
async fn test_no_sub_queries_is_fatal() {
    let orchestrator = FanOutOrchestrator::new(vec![ScriptedAdapter::hits(BackendKind::Vector, &[]).shared()]);
    let result = orchestrator
        .execute(vec![], Instant::now() + Duration::from_secs(1))
        .await;
    assert_eq!(result.unwrap_err(), RagError::NoBackendsConfigured);
}

#[tokio::test]
async fn test_calls_run_concurrently() {
    let latency = Duration::from_millis(120);
    let orchestrator = FanOutOrchestrator::new(
        BackendKind::ALL
            .iter()
            .map(|k| ScriptedAdapter::hits(*k, &[("x", 0.5)]).with_latency(latency).shared())
            .collect(),
    );
    let plan = BackendKind::ALL.iter().map(|k| sub_query(*k, 1_000)).collect();

    let start = Instant::now();
    let results = orchestrator
        .execute(plan, Instant::now() + Duration::from_secs(2))
        .await
        .unwrap();

    // Sequential dispatch would take three times the latency
    assert!(start.elapsed() < latency * 2, "took {:?}", start.elapsed());
    assert!(results.values().all(BackendResult::is_success));
}

#[tokio::test]
async fn test_output_keyed_by_backend_not_completion_order() {
    let orchestrator = FanOutOrchestrator::new(vec![
        ScriptedAdapter::hits(BackendKind::Vector, &[("v", 0.9)])
            .with_latency(Duration::from_millis(60))
            .shared(),
        ScriptedAdapter::hits(BackendKind::Relational, &[("r", 0.5)]).shared(),
    ]);
    let plan = vec![
        sub_query(BackendKind::Relational, 1_000),
        sub_query(BackendKind::Vector, 1_000),
    ];

    let results = orchestrator
        .execute(plan, Instant::now() + Duration::from_secs(1))
        .await
        .unwrap();
    let keys: Vec<_> = results.keys().copied().collect();
    assert_eq!(keys, vec![BackendKind::Vector, BackendKind::Relational]);
}

#[tokio::test]
async fn test_per_backend_deadline_is_min_of_both() {
    let vector = ScriptedAdapter::hits(BackendKind::Vector, &[("v", 0.9)]).with_latency(Duration::from_millis(200));
    let graph = ScriptedAdapter::hits(BackendKind::Graph, &[("g", 0.7)]).with_latency(Duration::from_millis(10));
    let orchestrator = FanOutOrchestrator::new(vec![vector.shared(), graph.shared()]);

    let plan = vec![sub_query(BackendKind::Vector, 50), sub_query(BackendKind::Graph, 1_000)];
    let start = Instant::now();
    let results = orchestrator
        .execute(plan, Instant::now() + Duration::from_secs(5))
        .await
        .unwrap();

    assert!(start.elapsed() < Duration::from_millis(180));
    assert_eq!(results[&BackendKind::Vector], BackendResult::Timeout);
    assert!(results[&BackendKind::Graph].is_success());
}

#[tokio::test]
async fn test_overall_deadline_bounds_misbehaving_adapters() {
    let slow = ScriptedAdapter::hits(BackendKind::Relational, &[("r", 0.5)])
        .with_latency(Duration::from_secs(3))
        .ignoring_deadline();
    let orchestrator = FanOutOrchestrator::new(vec![
        slow.shared(),
        ScriptedAdapter::hits(BackendKind::Vector, &[("v", 0.9)]).shared(),
    ]);
    let plan = vec![
        sub_query(BackendKind::Vector, 10_000),
        sub_query(BackendKind::Relational, 10_000),
    ];

    let overall = Duration::from_millis(80);
    let start = Instant::now();
    let results = orchestrator.execute(plan, Instant::now() + overall).await.unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= overall);
    assert!(elapsed < overall + Duration::from_millis(100), "took {:?}", elapsed);
    assert_eq!(results.len(), 2);
    assert_eq!(results[&BackendKind::Relational], BackendResult::Timeout);
    assert!(results[&BackendKind::Vector].is_success());
}

#[tokio::test]
async fn test_expired_overall_deadline_marks_everything_timeout() {
    let orchestrator = FanOutOrchestrator::new(vec![
        ScriptedAdapter::hits(BackendKind::Vector, &[("v", 0.9)])
            .with_latency(Duration::from_millis(50))
            .shared(),
        ScriptedAdapter::hits(BackendKind::Graph, &[("g", 0.7)])
            .with_latency(Duration::from_millis(50))
            .shared(),
    ]);
    let plan = vec![sub_query(BackendKind::Vector, 500), sub_query(BackendKind::Graph, 500)];

    let results = orchestrator.execute(plan, Instant::now()).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.values().all(|r| *r == BackendResult::Timeout));
}

#[tokio::test]
async fn test_failures_are_recorded_not_raised() {
    let orchestrator = FanOutOrchestrator::new(vec![
        ScriptedAdapter::failing(BackendKind::Graph, ErrorKind::BackendRejected, "syntax error").shared(),
        ScriptedAdapter::hits(BackendKind::Vector, &[("v", 0.9)]).shared(),
    ]);
    let plan = vec![
        sub_query(BackendKind::Vector, 500),
        sub_query(BackendKind::Graph, 500),
        sub_query(BackendKind::Relational, 500),
    ];

    let results = orchestrator
        .execute(plan, Instant::now() + Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(
        results[&BackendKind::Graph],
        BackendResult::failure(ErrorKind::BackendRejected, "syntax error")
    );
    assert!(matches!(
        results[&BackendKind::Relational],
        BackendResult::Failure {
            kind: ErrorKind::Unavailable,
            ..
        }
    ));
}

#[tokio::test]
async fn test_each_sub_query_dispatched_exactly_once() {
    let vector = ScriptedAdapter::hits(BackendKind::Vector, &[("v", 0.9)]);
    let calls = vector.calls();
    let seen = vector.seen();
    let orchestrator = FanOutOrchestrator::new(vec![vector.shared()]);

    let plan = vec![sub_query(BackendKind::Vector, 500), sub_query(BackendKind::Vector, 900)];
    orchestrator
        .execute(plan, Instant::now() + Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(seen.lock().unwrap()[0].timeout, Duration::from_millis(500));
}
