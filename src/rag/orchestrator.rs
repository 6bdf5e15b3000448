// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Concurrent fan-out of sub-queries to backend adapters
//!
//! Every sub-query runs on its own task. The orchestrator never waits past
//! the overall deadline: whatever is still running at that instant is
//! aborted and recorded as `Timeout`.

use futures::FutureExt;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, warn};

use super::errors::RagError;
use super::types::{BackendKind, BackendResult, BackendResults, ErrorKind, SubQuery};
use crate::backends::BackendAdapter;

/// Dispatches sub-queries to registered adapters in parallel
#[derive(Clone)]
pub struct FanOutOrchestrator {
    adapters: BTreeMap<BackendKind, Arc<dyn BackendAdapter>>,
}

impl FanOutOrchestrator {
    /// Register adapters; a later adapter for the same backend replaces an earlier one
    pub fn new(adapters: Vec<Arc<dyn BackendAdapter>>) -> Self {
        let mut map = BTreeMap::new();
        for adapter in adapters {
            if map.insert(adapter.kind(), adapter).is_some() {
                warn!("Duplicate adapter registered; keeping the last one");
            }
        }
        Self { adapters: map }
    }

    /// Backends with a registered adapter, in priority order
    pub fn backends(&self) -> Vec<BackendKind> {
        self.adapters.keys().copied().collect()
    }

    pub fn adapters(&self) -> impl Iterator<Item = (&BackendKind, &Arc<dyn BackendAdapter>)> {
        self.adapters.iter()
    }

    /// Run every sub-query concurrently and collect one result per backend
    ///
    /// Each call is bounded by `min(overall_deadline, now + sub_query.timeout)`.
    /// The returned map always has an entry for every dispatched backend.
    ///
    /// # Errors
    /// `RagError::NoBackendsConfigured` if `sub_queries` is empty.
    pub async fn execute(
        &self,
        sub_queries: Vec<SubQuery>,
        overall_deadline: Instant,
    ) -> Result<BackendResults, RagError> {
        if sub_queries.is_empty() {
            return Err(RagError::NoBackendsConfigured);
        }

        let mut results = BackendResults::new();
        let mut pending: BTreeSet<BackendKind> = BTreeSet::new();
        let mut tasks = JoinSet::new();
        let now = Instant::now();

        for sub_query in sub_queries {
            let kind = sub_query.backend();
            if pending.contains(&kind) || results.contains_key(&kind) {
                warn!("Dropping duplicate sub-query for {} backend", kind);
                continue;
            }

            let adapter = match self.adapters.get(&kind) {
                Some(adapter) => Arc::clone(adapter),
                None => {
                    warn!("No adapter registered for {} backend", kind);
                    results.insert(
                        kind,
                        BackendResult::failure(
                            ErrorKind::Unavailable,
                            format!("no adapter registered for {} backend", kind),
                        ),
                    );
                    continue;
                }
            };

            let deadline = overall_deadline.min(now + sub_query.timeout);
            debug!(
                "Dispatching {} sub-query (timeout {}ms)",
                kind,
                deadline.saturating_duration_since(now).as_millis()
            );

            pending.insert(kind);
            tasks.spawn(async move {
                let call = AssertUnwindSafe(adapter.query(sub_query, deadline)).catch_unwind();
                let result = match timeout_at(deadline, call).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => {
                        error!("{} adapter panicked", kind);
                        BackendResult::failure(ErrorKind::Internal, "adapter task panicked")
                    }
                    Err(_) => BackendResult::Timeout,
                };
                (kind, result)
            });
        }

        let mut expired = false;
        loop {
            match timeout_at(overall_deadline, tasks.join_next()).await {
                Ok(Some(Ok((kind, result)))) => {
                    pending.remove(&kind);
                    results.insert(kind, result);
                }
                Ok(Some(Err(e))) => {
                    error!("Backend task failed to join: {}", e);
                }
                Ok(None) => break,
                Err(_) => {
                    expired = true;
                    tasks.abort_all();
                    break;
                }
            }
        }

        for kind in pending {
            if expired {
                warn!("{} backend still running at overall deadline; cancelled", kind);
                results.insert(kind, BackendResult::Timeout);
            } else {
                results.insert(
                    kind,
                    BackendResult::failure(ErrorKind::Internal, "backend task aborted"),
                );
            }
        }

        Ok(results)
    }
}
