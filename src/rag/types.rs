// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request-scoped data model for retrieval-augmented context assembly
//!
//! Every value here is created fresh per request and dropped once the
//! response is sent. Nothing in this module is shared across requests.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The closed set of retrieval backends
///
/// Variant order is the backend priority order used as the final merge
/// tie-break: `Vector` outranks `Graph`, which outranks `Relational`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Vector,
    Graph,
    Relational,
}

impl BackendKind {
    /// All backends in priority order
    pub const ALL: [BackendKind; 3] = [BackendKind::Vector, BackendKind::Graph, BackendKind::Relational];

    /// Wire name used in requests, responses and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Vector => "vector",
            BackendKind::Graph => "graph",
            BackendKind::Relational => "relational",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" => Ok(BackendKind::Vector),
            "graph" => Ok(BackendKind::Graph),
            "relational" => Ok(BackendKind::Relational),
            other => Err(format!(
                "unknown backend '{}' (expected vector, graph or relational)",
                other
            )),
        }
    }
}

/// Optional per-request retrieval constraints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryConstraints {
    /// Upper bound on fragments requested from each backend
    pub max_results_per_backend: Option<usize>,
    /// Overrides every backend's configured timeout
    pub per_backend_timeout: Option<Duration>,
    /// Overrides the configured overall deadline
    pub overall_timeout: Option<Duration>,
    /// Overrides the configured maximum merged context size
    pub max_fragments: Option<usize>,
    /// Backends to skip entirely
    pub disabled_backends: BTreeSet<BackendKind>,
}

/// An incoming natural-language retrieval request
#[derive(Debug, Clone, PartialEq)]
pub struct RagQuery {
    pub text: String,
    pub constraints: QueryConstraints,
}

impl RagQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            constraints: QueryConstraints::default(),
        }
    }

    pub fn with_constraints(mut self, constraints: QueryConstraints) -> Self {
        self.constraints = constraints;
        self
    }
}

/// Backend-specific request produced by the planner
///
/// The variant determines which backend the sub-query targets.
#[derive(Debug, Clone, PartialEq)]
pub enum SubQueryPayload {
    /// Similarity search; the adapter embeds `text` before querying
    Vector { text: String, top_k: usize },
    /// Traversal from nodes matching any seed term
    Graph {
        seeds: Vec<String>,
        max_depth: u8,
        limit: usize,
    },
    /// Keyword predicate over the configured text column
    Relational { terms: Vec<String>, limit: usize },
}

impl SubQueryPayload {
    pub fn backend(&self) -> BackendKind {
        match self {
            SubQueryPayload::Vector { .. } => BackendKind::Vector,
            SubQueryPayload::Graph { .. } => BackendKind::Graph,
            SubQueryPayload::Relational { .. } => BackendKind::Relational,
        }
    }

    /// Maximum number of hits requested from the backend
    pub fn limit(&self) -> usize {
        match self {
            SubQueryPayload::Vector { top_k, .. } => *top_k,
            SubQueryPayload::Graph { limit, .. } => *limit,
            SubQueryPayload::Relational { limit, .. } => *limit,
        }
    }
}

/// One unit of work for one backend
#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery {
    pub payload: SubQueryPayload,
    /// Per-backend timeout, capped by the overall deadline at dispatch
    pub timeout: Duration,
}

impl SubQuery {
    pub fn new(payload: SubQueryPayload, timeout: Duration) -> Self {
        Self { payload, timeout }
    }

    pub fn backend(&self) -> BackendKind {
        self.payload.backend()
    }
}

/// A retrieved fragment with a backend-local relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredFragment {
    pub text: String,
    pub score: f32,
    /// Backend that produced the fragment
    pub backend: BackendKind,
}

impl ScoredFragment {
    pub fn new(text: impl Into<String>, score: f32, backend: BackendKind) -> Self {
        Self {
            text: text.into(),
            score,
            backend,
        }
    }
}

/// Classification of a per-backend failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The backend refused the query, or transport kept failing after the retry
    BackendRejected,
    /// No adapter is registered for the planned backend
    Unavailable,
    /// The adapter task failed unexpectedly
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::BackendRejected => f.write_str("backend_rejected"),
            ErrorKind::Unavailable => f.write_str("unavailable"),
            ErrorKind::Internal => f.write_str("internal"),
        }
    }
}

/// Terminal outcome of one sub-query
#[derive(Debug, Clone, PartialEq)]
pub enum BackendResult {
    /// Fragments in the backend's own ranking order
    Success(Vec<ScoredFragment>),
    Failure { kind: ErrorKind, message: String },
    Timeout,
}

impl BackendResult {
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        BackendResult::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BackendResult::Success(_))
    }
}

/// Outcome of a fan-out, keyed (and ordered) by backend
pub type BackendResults = BTreeMap<BackendKind, BackendResult>;

/// A merged, deduplicated fragment
#[derive(Debug, Clone, PartialEq)]
pub struct ContextFragment {
    pub text: String,
    /// Normalized score in [0, 1]
    pub score: f32,
    /// Every backend that produced this content
    pub provenance: BTreeSet<BackendKind>,
    /// Hex content fingerprint
    pub fingerprint: String,
}

/// The merged retrieval context returned to the caller
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RagContext {
    pub fragments: Vec<ContextFragment>,
}

impl RagContext {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }
}

/// Per-backend summary reported alongside the context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackendStatus {
    #[serde(rename_all = "camelCase")]
    Success { fragment_count: usize },
    #[serde(rename_all = "camelCase")]
    Failure { error_kind: ErrorKind, message: String },
    Timeout,
}

impl From<&BackendResult> for BackendStatus {
    fn from(result: &BackendResult) -> Self {
        match result {
            BackendResult::Success(fragments) => BackendStatus::Success {
                fragment_count: fragments.len(),
            },
            BackendResult::Failure { kind, message } => BackendStatus::Failure {
                error_kind: *kind,
                message: message.clone(),
            },
            BackendResult::Timeout => BackendStatus::Timeout,
        }
    }
}

/// Full result of one GetRAGContext call
#[derive(Debug, Clone)]
pub struct RagOutcome {
    pub context: RagContext,
    /// True iff at least one dispatched backend did not succeed
    pub partial: bool,
    pub backends: BTreeMap<BackendKind, BackendStatus>,
    pub elapsed_ms: u64,
}
