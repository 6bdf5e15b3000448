// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Backend adapters for the vector, graph and relational stores

pub mod adapter;
pub mod embedder;
pub mod graph;
pub mod pool;
pub mod relational;
pub mod store;
pub mod vector;

pub use adapter::{BackendAdapter, BackendHealth, RetryPolicy, StoreAdapter};
pub use embedder::{Embedder, HashingEmbedder, HttpEmbedder};
pub use graph::{GraphCredentials, GraphStoreClient};
pub use pool::{HttpPool, PoolSettings, PoolStats};
pub use relational::RelationalStoreClient;
pub use store::{RawHit, StoreClient, StoreError};
pub use vector::VectorStoreClient;

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::RagConfig;
use crate::rag::errors::RagError;

fn config_error(backend: &str, err: StoreError) -> RagError {
    RagError::Config(format!("{} backend: {}", backend, err))
}

/// Build one adapter per configured backend
///
/// Pools are created here, once, and owned by the adapters. No network
/// connection is opened until the first query.
pub fn build_adapters(config: &RagConfig) -> Result<Vec<Arc<dyn BackendAdapter>>, RagError> {
    let retry = config.retry_policy();
    let mut adapters: Vec<Arc<dyn BackendAdapter>> = Vec::new();

    if let Some(v) = &config.vector {
        let pool = HttpPool::new(v.pool.clone()).map_err(|e| config_error("vector", e))?;
        let embedder: Arc<dyn Embedder> = match &v.embedding.url {
            Some(url) => Arc::new(HttpEmbedder::new(
                pool.clone(),
                url,
                v.embedding.model.clone(),
                v.embedding.dimensions,
            )),
            None => {
                info!(
                    "No embedding service configured; using {}D hashing embedder",
                    v.embedding.dimensions
                );
                Arc::new(HashingEmbedder::new(v.embedding.dimensions))
            }
        };
        let client = VectorStoreClient::new(
            pool,
            &v.url,
            v.collection.clone(),
            v.text_field.clone(),
            embedder,
        );
        adapters.push(Arc::new(StoreAdapter::with_retry(client, retry)));
        info!("Vector backend: {} (collection '{}')", v.url, v.collection);
    }

    if let Some(g) = &config.graph {
        let pool = HttpPool::new(g.pool.clone()).map_err(|e| config_error("graph", e))?;
        let credentials = match (&g.username, &g.password) {
            (Some(username), Some(password)) => Some(GraphCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };
        let client = GraphStoreClient::new(
            pool,
            &g.url,
            g.database.clone(),
            credentials,
            g.match_property.clone(),
            g.text_property.clone(),
        );
        adapters.push(Arc::new(StoreAdapter::with_retry(client, retry)));
        info!("Graph backend: {} (database '{}')", g.url, g.database);
    }

    if let Some(r) = &config.relational {
        let client = RelationalStoreClient::connect_lazy(
            &r.database_url,
            r.max_connections,
            Duration::from_millis(r.acquire_timeout_ms),
            r.table.clone(),
            r.text_column.clone(),
        )
        .map_err(|e| config_error("relational", e))?;
        adapters.push(Arc::new(StoreAdapter::with_retry(client, retry)));
        info!("Relational backend: table {}", r.table);
    }

    Ok(adapters)
}
