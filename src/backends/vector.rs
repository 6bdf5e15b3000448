// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vector store client (Qdrant-compatible REST API)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::embedder::Embedder;
use super::pool::HttpPool;
use super::store::{RawHit, StoreClient, StoreError};
use crate::rag::types::{BackendKind, SubQueryPayload};

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<Value>,
}

/// Similarity search over one collection
pub struct VectorStoreClient {
    pool: HttpPool,
    base_url: String,
    collection: String,
    text_field: String,
    embedder: Arc<dyn Embedder>,
}

impl VectorStoreClient {
    pub fn new(
        pool: HttpPool,
        base_url: &str,
        collection: String,
        text_field: String,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            pool,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection,
            text_field,
            embedder,
        }
    }

    fn search_url(&self) -> String {
        format!("{}/collections/{}/points/search", self.base_url, self.collection)
    }

    fn to_hits(&self, response: SearchResponse) -> Vec<RawHit> {
        response
            .result
            .into_iter()
            .filter_map(|point| {
                let text = point
                    .payload
                    .as_ref()
                    .and_then(|p| p.get(&self.text_field))
                    .and_then(|t| t.as_str())?
                    .to_string();
                Some(RawHit::new(text, point.score))
            })
            .collect()
    }
}

#[async_trait]
impl StoreClient for VectorStoreClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Vector
    }

    async fn fetch(&self, payload: &SubQueryPayload) -> Result<Vec<RawHit>, StoreError> {
        let (text, top_k) = match payload {
            SubQueryPayload::Vector { text, top_k } => (text, *top_k),
            other => {
                return Err(StoreError::PayloadMismatch {
                    expected: BackendKind::Vector,
                    actual: other.backend(),
                })
            }
        };

        let embedding = self.embedder.embed(text).await?;
        if embedding.iter().all(|v| *v == 0.0) {
            debug!("Query embedded to a zero vector; skipping similarity search");
            return Ok(Vec::new());
        }

        let slot = self.pool.acquire().await?;
        let response = slot
            .client()
            .post(self.search_url())
            .json(&SearchRequest {
                vector: &embedding,
                limit: top_k,
                with_payload: true,
            })
            .send()
            .await
            .map_err(StoreError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::from_status(status, &body));
        }

        let data: SearchResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Rejected(format!("JSON parse error: {}", e)))?;

        let hits = self.to_hits(data);
        debug!("Vector store returned {} hits from '{}'", hits.len(), self.collection);
        Ok(hits)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let slot = self.pool.acquire().await?;
        let response = slot
            .client()
            .get(format!("{}/collections/{}", self.base_url, self.collection))
            .send()
            .await
            .map_err(StoreError::from_reqwest)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(StoreError::from_status(status, ""))
        }
    }
}
