// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text-to-embedding translation for the vector backend
//!
//! `HttpEmbedder` calls a node's `/v1/embed` endpoint; `HashingEmbedder` is a
//! deterministic offline fallback for development and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::pool::HttpPool;
use super::store::StoreError;
use crate::rag::keywords::tokenize;

/// Produces a query embedding
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError>;

    /// Output dimensionality
    fn dimensions(&self) -> usize;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    texts: Vec<&'a str>,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<EmbeddingResult>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResult {
    embedding: Vec<f32>,
}

/// Embedding service client (`POST {base_url}/v1/embed`)
pub struct HttpEmbedder {
    pool: HttpPool,
    endpoint: String,
    model: String,
    dimensions: usize,
}

impl HttpEmbedder {
    pub fn new(pool: HttpPool, base_url: &str, model: String, dimensions: usize) -> Self {
        Self {
            pool,
            endpoint: format!("{}/v1/embed", base_url.trim_end_matches('/')),
            model,
            dimensions,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        let slot = self.pool.acquire().await?;
        let response = slot
            .client()
            .post(&self.endpoint)
            .json(&EmbedRequest {
                texts: vec![text],
                model: &self.model,
            })
            .send()
            .await
            .map_err(StoreError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return match StoreError::from_status(status, &body) {
                StoreError::Rejected(msg) => Err(StoreError::Embedding(msg)),
                transient => Err(transient),
            };
        }

        let data: EmbedResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Embedding(format!("JSON parse error: {}", e)))?;

        let embedding = data
            .embeddings
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| StoreError::Embedding("empty embeddings array".to_string()))?;

        if embedding.len() != self.dimensions {
            return Err(StoreError::Embedding(format!(
                "expected {}D embedding, got {}D",
                self.dimensions,
                embedding.len()
            )));
        }

        debug!("Embedded query with {} ({}D)", self.model, embedding.len());
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Signed feature hashing of query tokens, L2-normalized
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Synchronous core, shared with tests and offline indexing
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        Ok(self.embed_text(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
