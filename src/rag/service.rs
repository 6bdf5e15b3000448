// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Retrieval service: plan, fan out, merge

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use super::errors::RagError;
use super::merger::ResultMerger;
use super::orchestrator::FanOutOrchestrator;
use super::planner::QueryPlanner;
use super::types::{BackendKind, BackendStatus, RagOutcome, RagQuery};
use crate::backends::{build_adapters, BackendAdapter, BackendHealth};
use crate::config::RagConfig;

/// Upper bound on a single backend health probe
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// The GetRAGContext operation over a fixed set of adapters
#[derive(Clone)]
pub struct RagService {
    planner: QueryPlanner,
    orchestrator: FanOutOrchestrator,
    merger: ResultMerger,
    overall_timeout: Duration,
}

impl RagService {
    /// Compose a service from injected adapters
    ///
    /// Only backends with an adapter are planned; per-backend defaults and
    /// merge policy come from `config`.
    pub fn new(adapters: Vec<Arc<dyn BackendAdapter>>, config: &RagConfig) -> Self {
        let orchestrator = FanOutOrchestrator::new(adapters);
        let defaults = orchestrator
            .backends()
            .into_iter()
            .map(|kind| (kind, config.backend_defaults(kind)))
            .collect();

        Self {
            planner: QueryPlanner::new(defaults).with_graph_max_depth(config.graph_max_depth()),
            orchestrator,
            merger: ResultMerger::new(config.merge.clone()),
            overall_timeout: config.overall_timeout(),
        }
    }

    /// Build adapters and pools from configuration
    pub fn from_config(config: &RagConfig) -> Result<Self, RagError> {
        let adapters = build_adapters(config)?;
        Ok(Self::new(adapters, config))
    }

    pub fn configured_backends(&self) -> Vec<BackendKind> {
        self.planner.configured_backends()
    }

    /// Assemble a retrieval context for one query
    ///
    /// # Errors
    /// `InvalidQuery` before any backend is contacted, or
    /// `NoBackendsConfigured` when nothing is left to dispatch. Backend
    /// failures never error; they set `partial`.
    pub async fn get_context(&self, query: RagQuery) -> Result<RagOutcome, RagError> {
        let start = Instant::now();

        let sub_queries = self.planner.plan(&query)?;
        let overall = query.constraints.overall_timeout.unwrap_or(self.overall_timeout);
        let results = self.orchestrator.execute(sub_queries, start + overall).await?;

        let max_fragments = query
            .constraints
            .max_fragments
            .unwrap_or(self.merger.config().max_fragments);
        let context = self.merger.merge_with_limit(&results, max_fragments);

        let partial = results.values().any(|r| !r.is_success());
        let backends: BTreeMap<BackendKind, BackendStatus> = results
            .iter()
            .map(|(kind, result)| (*kind, BackendStatus::from(result)))
            .collect();
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if partial {
            warn!(
                "Partial context: {} fragments, {}/{} backends succeeded in {}ms",
                context.len(),
                results.values().filter(|r| r.is_success()).count(),
                results.len(),
                elapsed_ms
            );
        } else {
            info!(
                "Context assembled: {} fragments from {} backends in {}ms",
                context.len(),
                results.len(),
                elapsed_ms
            );
        }

        Ok(RagOutcome {
            context,
            partial,
            backends,
            elapsed_ms,
        })
    }

    /// Probe every backend concurrently
    pub async fn health(&self) -> BTreeMap<BackendKind, BackendHealth> {
        let probes = self.orchestrator.adapters().map(|(kind, adapter)| {
            let adapter = Arc::clone(adapter);
            let kind = *kind;
            async move {
                let health = match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, adapter.health()).await {
                    Ok(health) => health,
                    Err(_) => BackendHealth {
                        healthy: false,
                        latency_ms: HEALTH_CHECK_TIMEOUT.as_millis() as u64,
                        error: Some("health check timed out".to_string()),
                    },
                };
                (kind, health)
            }
        });

        join_all(probes).await.into_iter().collect()
    }
}
