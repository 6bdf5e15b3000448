// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! GetRAGContext response types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::backends::BackendHealth;
use crate::rag::{BackendKind, BackendStatus, ContextFragment, RagOutcome};

/// One merged fragment as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentResponse {
    pub text: String,
    pub score: f32,
    /// Backends that produced this fragment, in priority order
    pub provenance: Vec<BackendKind>,
}

impl From<ContextFragment> for FragmentResponse {
    fn from(fragment: ContextFragment) -> Self {
        Self {
            text: fragment.text,
            score: fragment.score,
            provenance: fragment.provenance.into_iter().collect(),
        }
    }
}

/// Response body for POST /v1/rag/context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagContextResponse {
    /// Ranked, deduplicated fragments
    pub fragments: Vec<FragmentResponse>,

    /// True iff at least one backend did not succeed
    pub partial: bool,

    pub fragment_count: usize,

    /// Wall-clock time spent assembling the context
    pub elapsed_ms: u64,

    /// Per-backend outcome
    pub backends: BTreeMap<BackendKind, BackendStatus>,

    pub request_id: String,
}

impl RagContextResponse {
    pub fn from_outcome(outcome: RagOutcome, request_id: String) -> Self {
        let fragments: Vec<FragmentResponse> = outcome
            .context
            .fragments
            .into_iter()
            .map(FragmentResponse::from)
            .collect();

        Self {
            fragment_count: fragments.len(),
            fragments,
            partial: outcome.partial,
            elapsed_ms: outcome.elapsed_ms,
            backends: outcome.backends,
            request_id,
        }
    }
}

/// Response body for GET /health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` when every configured backend answers, otherwise `degraded`
    pub status: String,
    pub version: String,
    pub backends: BTreeMap<BackendKind, BackendHealth>,
}

impl HealthResponse {
    pub fn new(backends: BTreeMap<BackendKind, BackendHealth>) -> Self {
        let healthy = !backends.is_empty() && backends.values().all(|h| h.healthy);
        Self {
            status: if healthy { "ok" } else { "degraded" }.to_string(),
            version: crate::version::VERSION.to_string(),
            backends,
        }
    }
}
