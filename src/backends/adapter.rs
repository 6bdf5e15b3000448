// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Backend adapter trait and the deadline-aware store adapter

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use super::store::{RawHit, StoreClient, StoreError};
use crate::rag::types::{BackendKind, BackendResult, ErrorKind, ScoredFragment, SubQuery};

/// Liveness report for one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendHealth {
    pub healthy: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Uniform query capability over one data store
///
/// All three backend kinds share this contract; they differ only in how a
/// payload is translated and transported.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Backend this adapter serves
    fn kind(&self) -> BackendKind;

    /// Run one sub-query, returning no later than `deadline`
    ///
    /// Never returns an error: every outcome is a `BackendResult`.
    async fn query(&self, sub_query: SubQuery, deadline: Instant) -> BackendResult;

    /// Probe the backend
    async fn health(&self) -> BackendHealth;
}

/// Retry policy for transient transport errors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: Duration::from_millis(50),
        }
    }
}

/// Adapter over a `StoreClient` that enforces the deadline and retry policy
pub struct StoreAdapter<C> {
    client: C,
    retry: RetryPolicy,
}

impl<C: StoreClient> StoreAdapter<C> {
    pub fn new(client: C) -> Self {
        Self::with_retry(client, RetryPolicy::default())
    }

    pub fn with_retry(client: C, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    async fn fetch_with_retry(&self, sub_query: &SubQuery) -> Result<Vec<RawHit>, StoreError> {
        let mut attempt = 0;
        loop {
            match self.client.fetch(&sub_query.payload).await {
                Ok(hits) => return Ok(hits),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    warn!(
                        "{} backend transport error (attempt {}), retrying in {}ms: {}",
                        self.client.kind(),
                        attempt,
                        self.retry.backoff.as_millis(),
                        e
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn into_fragments(&self, hits: Vec<RawHit>) -> Vec<ScoredFragment> {
        let kind = self.client.kind();
        let total = hits.len();
        let fragments: Vec<ScoredFragment> = hits
            .into_iter()
            .filter(|h| h.score.is_finite() && !h.text.trim().is_empty())
            .map(|h| ScoredFragment::new(h.text, h.score, kind))
            .collect();

        if fragments.len() < total {
            debug!(
                "{} backend: dropped {} hits with empty text or non-finite score",
                kind,
                total - fragments.len()
            );
        }
        fragments
    }
}

#[async_trait]
impl<C: StoreClient> BackendAdapter for StoreAdapter<C> {
    fn kind(&self) -> BackendKind {
        self.client.kind()
    }

    async fn query(&self, sub_query: SubQuery, deadline: Instant) -> BackendResult {
        let kind = self.client.kind();
        if sub_query.backend() != kind {
            let err = StoreError::PayloadMismatch {
                expected: kind,
                actual: sub_query.backend(),
            };
            return BackendResult::failure(ErrorKind::Internal, err.to_string());
        }

        // The backoff sleep is inside the race, so a retry can never outlive the deadline
        match timeout_at(deadline, self.fetch_with_retry(&sub_query)).await {
            Ok(Ok(hits)) => BackendResult::Success(self.into_fragments(hits)),
            Ok(Err(e)) => {
                warn!("{} backend failed: {}", kind, e);
                BackendResult::failure(ErrorKind::BackendRejected, e.to_string())
            }
            Err(_) => {
                warn!("{} backend missed its deadline", kind);
                BackendResult::Timeout
            }
        }
    }

    async fn health(&self) -> BackendHealth {
        let start = Instant::now();
        let result = self.client.ping().await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => BackendHealth {
                healthy: true,
                latency_ms,
                error: None,
            },
            Err(e) => BackendHealth {
                healthy: false,
                latency_ms,
                error: Some(e.to_string()),
            },
        }
    }
}
