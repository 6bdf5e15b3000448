// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /v1/rag/context tests
//!
//! The router is exercised in-process with `oneshot`; backends are scripted.

use crate::common::{capital_of_france_adapters, service_with, ScriptedAdapter};
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use fabstir_rag_node::api::{build_router, AppState, ErrorResponse, RagContextResponse};
use fabstir_rag_node::rag::BackendKind;
use serde_json::{json, Value};
use std::time::Duration;
use tower::util::ServiceExt;

fn app(adapters: Vec<ScriptedAdapter>) -> Router {
    build_router(AppState::new(service_with(adapters)))
}

async fn post_json(app: Router, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/rag/context")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_context_all_backends_succeed() {
    let (status, body) = post_json(
        app(capital_of_france_adapters()),
        json!({"query": "capital of France", "requestId": "req-42"}).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let response: RagContextResponse = serde_json::from_value(body.clone()).unwrap();
    assert!(!response.partial);
    assert_eq!(response.fragment_count, 3);
    assert_eq!(response.request_id, "req-42");
    assert_eq!(response.fragments[0].text, "Paris is the capital of France.");
    assert_eq!(body["fragments"][0]["provenance"], json!(["vector"]));
    assert_eq!(body["backends"]["relational"]["status"], "success");
}

#[tokio::test]
async fn test_context_vector_timeout_is_partial() {
    let mut adapters = capital_of_france_adapters();
    adapters[0] = ScriptedAdapter::hits(BackendKind::Vector, &[("Paris is the capital of France.", 0.9)])
        .with_latency(Duration::from_millis(200));

    let (status, body) = post_json(
        app(adapters),
        json!({
            "query": "capital of France",
            "options": {"perBackendTimeoutMs": 50}
        })
        .to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["partial"], true);
    assert_eq!(body["fragmentCount"], 2);
    assert_eq!(body["backends"]["vector"]["status"], "timeout");
    assert_eq!(body["fragments"][0]["provenance"], json!(["graph"]));
    assert_eq!(body["fragments"][1]["provenance"], json!(["relational"]));
}

#[tokio::test]
async fn test_context_generates_request_id() {
    let (status, body) = post_json(
        app(capital_of_france_adapters()),
        json!({"query": "capital of France"}).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let id = body["requestId"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn test_empty_query_is_400_without_backend_calls() {
    let adapters = capital_of_france_adapters();
    let counters: Vec<_> = adapters.iter().map(|a| a.calls()).collect();

    let (status, body) = post_json(app(adapters), json!({"query": ""}).to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = serde_json::from_value(body).unwrap();
    assert_eq!(error.error_type, "invalid_query");
    assert!(error.request_id.is_some());
    assert!(counters
        .iter()
        .all(|c| c.load(std::sync::atomic::Ordering::SeqCst) == 0));
}

#[tokio::test]
async fn test_unknown_backend_is_400() {
    let (status, body) = post_json(
        app(capital_of_france_adapters()),
        json!({"query": "x", "options": {"disabledBackends": ["elastic"]}}).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorType"], "invalid_query");
    assert_eq!(body["details"]["field"], "options.disabledBackends");
}

#[tokio::test]
async fn test_out_of_range_option_is_400() {
    let (status, body) = post_json(
        app(capital_of_france_adapters()),
        json!({"query": "x", "options": {"maxFragments": 0}}).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["field"], "options.maxFragments");
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let (status, body) = post_json(app(capital_of_france_adapters()), "{not json".to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorType"], "invalid_request");
}

#[tokio::test]
async fn test_all_disabled_is_503() {
    let (status, body) = post_json(
        app(capital_of_france_adapters()),
        json!({
            "query": "capital of France",
            "options": {"disabledBackends": ["vector", "graph", "relational"]}
        })
        .to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["errorType"], "no_backends_configured");
}

#[tokio::test]
async fn test_max_fragments_option_truncates() {
    let (status, body) = post_json(
        app(capital_of_france_adapters()),
        json!({"query": "capital of France", "options": {"maxFragments": 1}}).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fragmentCount"], 1);
    assert_eq!(body["partial"], false);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/v1/unknown")
        .body(Body::empty())
        .unwrap();

    let response = app(vec![]).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
