// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Graph store client (Neo4j HTTP transactional endpoint)
//!
//! Seed nodes are those whose match property contains any seed term. Paths
//! are expanded up to `max_depth` hops; each reachable node with text is
//! scored by how many seeds reach it, discounted by distance.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::pool::HttpPool;
use super::store::{RawHit, StoreClient, StoreError};
use crate::rag::types::{BackendKind, SubQueryPayload};

/// Hard cap on traversal depth regardless of configuration
pub const MAX_TRAVERSAL_DEPTH: u8 = 4;

#[derive(Debug, Serialize)]
struct TxRequest {
    statements: Vec<Statement>,
}

#[derive(Debug, Serialize)]
struct Statement {
    statement: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<Neo4jError>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    data: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct Row {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Neo4jError {
    code: String,
    message: String,
}

/// Credentials for basic auth
#[derive(Debug, Clone)]
pub struct GraphCredentials {
    pub username: String,
    pub password: String,
}

/// Traversal-based retrieval over a property graph
pub struct GraphStoreClient {
    pool: HttpPool,
    base_url: String,
    database: String,
    credentials: Option<GraphCredentials>,
    match_property: String,
    text_property: String,
}

impl GraphStoreClient {
    /// Property names must already be validated identifiers
    pub fn new(
        pool: HttpPool,
        base_url: &str,
        database: String,
        credentials: Option<GraphCredentials>,
        match_property: String,
        text_property: String,
    ) -> Self {
        Self {
            pool,
            base_url: base_url.trim_end_matches('/').to_string(),
            database,
            credentials,
            match_property,
            text_property,
        }
    }

    fn commit_url(&self) -> String {
        format!("{}/db/{}/tx/commit", self.base_url, self.database)
    }

    /// Build the traversal statement
    ///
    /// Variable-length bounds cannot be parameters in Cypher, so the depth is
    /// formatted in after clamping; everything user-derived is a parameter.
    fn traversal_cypher(&self, max_depth: u8) -> String {
        let depth = max_depth.clamp(1, MAX_TRAVERSAL_DEPTH);
        format!(
            "MATCH (seed) \
             WHERE any(term IN $seeds WHERE toLower(toString(seed.{m})) CONTAINS term) \
             MATCH path = (seed)-[*0..{d}]-(related) \
             WHERE related.{t} IS NOT NULL \
             WITH related, count(DISTINCT seed) AS matched, min(length(path)) AS hops \
             RETURN toString(related.{t}) AS text, toFloat(matched) / (1 + hops) AS score \
             ORDER BY score DESC \
             LIMIT $limit",
            m = self.match_property,
            t = self.text_property,
            d = depth
        )
    }

    async fn commit(&self, request: TxRequest) -> Result<TxResponse, StoreError> {
        let slot = self.pool.acquire().await?;
        let mut builder = slot.client().post(self.commit_url()).json(&request);
        if let Some(creds) = &self.credentials {
            builder = builder.basic_auth(&creds.username, Some(&creds.password));
        }

        let response = builder.send().await.map_err(StoreError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::from_status(status, &body));
        }

        let data: TxResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Rejected(format!("JSON parse error: {}", e)))?;

        if let Some(err) = data.errors.first() {
            // Transient cluster errors are marked as such by Neo4j
            return Err(if err.code.contains(".TransientError.") {
                StoreError::Transport(format!("{}: {}", err.code, err.message))
            } else {
                StoreError::Rejected(format!("{}: {}", err.code, err.message))
            });
        }

        Ok(data)
    }
}

fn rows_to_hits(response: TxResponse) -> Vec<RawHit> {
    response
        .results
        .into_iter()
        .flat_map(|r| r.data)
        .filter_map(|row| {
            let text = row.row.first()?.as_str()?.to_string();
            let score = row.row.get(1)?.as_f64()? as f32;
            Some(RawHit::new(text, score))
        })
        .collect()
}

#[async_trait]
impl StoreClient for GraphStoreClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Graph
    }

    async fn fetch(&self, payload: &SubQueryPayload) -> Result<Vec<RawHit>, StoreError> {
        let (seeds, max_depth, limit) = match payload {
            SubQueryPayload::Graph {
                seeds,
                max_depth,
                limit,
            } => (seeds, *max_depth, *limit),
            other => {
                return Err(StoreError::PayloadMismatch {
                    expected: BackendKind::Graph,
                    actual: other.backend(),
                })
            }
        };

        let request = TxRequest {
            statements: vec![Statement {
                statement: self.traversal_cypher(max_depth),
                parameters: json!({ "seeds": seeds, "limit": limit }),
            }],
        };

        let hits = rows_to_hits(self.commit(request).await?);
        debug!("Graph store returned {} hits for {} seeds", hits.len(), seeds.len());
        Ok(hits)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let request = TxRequest {
            statements: vec![Statement {
                statement: "RETURN 1".to_string(),
                parameters: json!({}),
            }],
        };
        self.commit(request).await.map(|_| ())
    }
}
