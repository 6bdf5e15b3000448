// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vector client against an in-process Qdrant-style server

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use fabstir_rag_node::backends::{
    BackendAdapter, Embedder, HashingEmbedder, HttpEmbedder, HttpPool, PoolSettings, RetryPolicy,
    StoreAdapter, StoreClient, StoreError, VectorStoreClient,
};
use fabstir_rag_node::rag::{BackendKind, BackendResult, ErrorKind, SubQuery, SubQueryPayload};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::Instant;

const DIMENSIONS: usize = 8;

/// Status codes to answer with before falling back to 200
#[derive(Clone, Default)]
struct MockQdrant {
    failures: Arc<Mutex<Vec<StatusCode>>>,
    searches: Arc<AtomicUsize>,
    last_body: Arc<Mutex<Option<Value>>>,
}

async fn search(
    State(mock): State<MockQdrant>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    mock.searches.fetch_add(1, Ordering::SeqCst);
    *mock.last_body.lock().unwrap() = Some(body);

    let next_failure = {
        let mut failures = mock.failures.lock().unwrap();
        if failures.is_empty() {
            None
        } else {
            Some(failures.remove(0))
        }
    };
    if let Some(status) = next_failure {
        return (status, Json(json!({"status": {"error": "scripted failure"}})));
    }

    if collection != "docs" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"status": {"error": format!("Collection `{}` doesn't exist!", collection)}})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "result": [
                {"id": 1, "score": 0.93, "payload": {"text": "Paris is the capital of France."}},
                {"id": 2, "score": 0.41, "payload": {"text": "France borders Spain."}},
                {"id": 3, "score": 0.30, "payload": {"title": "untitled"}}
            ],
            "status": "ok",
            "time": 0.001
        })),
    )
}

async fn embed(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let texts = body["texts"].as_array().cloned().unwrap_or_default();
    if body["model"] == "missing-model" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "model not loaded"})),
        );
    }
    let embeddings: Vec<Value> = texts
        .iter()
        .map(|t| json!({"embedding": vec![0.125f32; DIMENSIONS], "text": t, "tokenCount": 3}))
        .collect();
    (
        StatusCode::OK,
        Json(json!({"embeddings": embeddings, "model": body["model"]})),
    )
}

async fn spawn_server(mock: MockQdrant) -> String {
    let app = Router::new()
        .route("/collections/:collection/points/search", post(search))
        .route("/v1/embed", post(embed))
        .with_state(mock);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn pool() -> HttpPool {
    HttpPool::new(PoolSettings {
        max_connections: 4,
        ..Default::default()
    })
    .unwrap()
}

fn client(base_url: &str, collection: &str) -> VectorStoreClient {
    VectorStoreClient::new(
        pool(),
        base_url,
        collection.to_string(),
        "text".to_string(),
        Arc::new(HashingEmbedder::new(DIMENSIONS)),
    )
}

fn vector_payload(top_k: usize) -> SubQueryPayload {
    SubQueryPayload::Vector {
        text: "capital of France".to_string(),
        top_k,
    }
}

#[tokio::test]
async fn test_search_returns_hits_with_text() {
    let mock = MockQdrant::default();
    let base_url = spawn_server(mock.clone()).await;

    let hits = client(&base_url, "docs").fetch(&vector_payload(3)).await.unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].text, "Paris is the capital of France.");
    assert!((hits[0].score - 0.93).abs() < 1e-6);

    let body = mock.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["limit"], 3);
    assert_eq!(body["with_payload"], true);
    assert_eq!(body["vector"].as_array().unwrap().len(), DIMENSIONS);
}

#[tokio::test]
async fn test_punctuation_only_query_skips_search() {
    let mock = MockQdrant::default();
    let base_url = spawn_server(mock.clone()).await;
    let payload = SubQueryPayload::Vector {
        text: "???".to_string(),
        top_k: 3,
    };

    let hits = client(&base_url, "docs").fetch(&payload).await.unwrap();

    assert!(hits.is_empty());
    assert_eq!(mock.searches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_collection_is_rejected() {
    let base_url = spawn_server(MockQdrant::default()).await;

    let err = client(&base_url, "missing").fetch(&vector_payload(3)).await.unwrap_err();

    assert!(!err.is_transient());
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn test_unavailable_store_is_retried_by_adapter() {
    let mock = MockQdrant::default();
    mock.failures.lock().unwrap().push(StatusCode::SERVICE_UNAVAILABLE);
    let base_url = spawn_server(mock.clone()).await;

    let adapter = StoreAdapter::with_retry(
        client(&base_url, "docs"),
        RetryPolicy {
            max_retries: 1,
            backoff: Duration::from_millis(10),
        },
    );
    let result = adapter
        .query(
            SubQuery::new(vector_payload(5), Duration::from_secs(1)),
            Instant::now() + Duration::from_secs(2),
        )
        .await;

    assert_eq!(mock.searches.load(Ordering::SeqCst), 2);
    match result {
        BackendResult::Success(fragments) => {
            assert_eq!(fragments.len(), 2);
            assert!(fragments.iter().all(|f| f.backend == BackendKind::Vector));
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bad_request_is_not_retried() {
    let mock = MockQdrant::default();
    mock.failures.lock().unwrap().push(StatusCode::BAD_REQUEST);
    let base_url = spawn_server(mock.clone()).await;

    let adapter = StoreAdapter::new(client(&base_url, "docs"));
    let result = adapter
        .query(
            SubQuery::new(vector_payload(5), Duration::from_secs(1)),
            Instant::now() + Duration::from_secs(2),
        )
        .await;

    assert_eq!(mock.searches.load(Ordering::SeqCst), 1);
    assert!(matches!(
        result,
        BackendResult::Failure {
            kind: ErrorKind::BackendRejected,
            ..
        }
    ));
}

#[tokio::test]
async fn test_connection_refused_is_transient() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{}", addr), "docs")
        .fetch(&vector_payload(3))
        .await
        .unwrap_err();
    assert!(err.is_transient(), "unexpected error: {}", err);
}

#[tokio::test]
async fn test_http_embedder_round_trip() {
    let base_url = spawn_server(MockQdrant::default()).await;
    let embedder = HttpEmbedder::new(pool(), &base_url, "all-MiniLM-L6-v2".to_string(), DIMENSIONS);

    let embedding = embedder.embed("capital of France").await.unwrap();
    assert_eq!(embedding.len(), DIMENSIONS);
    assert!(embedding.iter().all(|v| *v == 0.125));
}

#[tokio::test]
async fn test_http_embedder_dimension_mismatch() {
    let base_url = spawn_server(MockQdrant::default()).await;
    let embedder = HttpEmbedder::new(pool(), &base_url, "all-MiniLM-L6-v2".to_string(), 384);

    let err = embedder.embed("capital of France").await.unwrap_err();
    assert!(matches!(err, StoreError::Embedding(_)));
    assert!(err.to_string().contains("384"));
}

#[tokio::test]
async fn test_http_embedder_missing_model_is_embedding_error() {
    let base_url = spawn_server(MockQdrant::default()).await;
    let embedder = HttpEmbedder::new(pool(), &base_url, "missing-model".to_string(), DIMENSIONS);

    let err = embedder.embed("capital of France").await.unwrap_err();
    assert!(matches!(err, StoreError::Embedding(_)));
}

#[tokio::test]
async fn test_vector_client_with_http_embedder() {
    let mock = MockQdrant::default();
    let base_url = spawn_server(mock.clone()).await;
    let shared = pool();
    let embedder = Arc::new(HttpEmbedder::new(
        shared.clone(),
        &base_url,
        "all-MiniLM-L6-v2".to_string(),
        DIMENSIONS,
    ));
    let client = VectorStoreClient::new(shared.clone(), &base_url, "docs".to_string(), "text".to_string(), embedder);

    let hits = client.fetch(&vector_payload(2)).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(shared.stats().in_use, 0);

    let body = mock.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["vector"][0], 0.125);
}
