// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Query planning
//!
//! Turns one `RagQuery` into one `SubQuery` per configured, non-disabled
//! backend. Planning is a pure transformation; embedding and transport are
//! left to the adapters.

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::errors::RagError;
use super::keywords::{extract_keywords, normalize_text};
use super::types::{BackendKind, RagQuery, SubQuery, SubQueryPayload};

/// Longest accepted query, in characters
pub const MAX_QUERY_CHARS: usize = 4096;

/// Maximum graph seeds / relational terms derived from one query
pub const MAX_QUERY_TERMS: usize = 8;

/// Per-backend planning defaults, taken from configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackendDefaults {
    /// Hits requested from the backend when the request does not say
    pub top_k: usize,
    /// Backend timeout when the request does not override it
    pub timeout: Duration,
}

/// Plans sub-queries for the configured backends
#[derive(Debug, Clone)]
pub struct QueryPlanner {
    backends: BTreeMap<BackendKind, BackendDefaults>,
    graph_max_depth: u8,
}

impl QueryPlanner {
    /// Create a planner over the given configured backends
    pub fn new(backends: BTreeMap<BackendKind, BackendDefaults>) -> Self {
        Self {
            backends,
            graph_max_depth: 2,
        }
    }

    /// Set how many hops graph traversals may expand
    pub fn with_graph_max_depth(mut self, depth: u8) -> Self {
        self.graph_max_depth = depth.max(1);
        self
    }

    /// Backends this planner can target, in priority order
    pub fn configured_backends(&self) -> Vec<BackendKind> {
        self.backends.keys().copied().collect()
    }

    /// Produce one sub-query per configured backend not disabled by the query
    ///
    /// # Errors
    /// `RagError::InvalidQuery` when the text is empty or too long, or when a
    /// constraint is zero. An empty result is not an error here; the
    /// orchestrator reports it as `NoBackendsConfigured`.
    pub fn plan(&self, query: &RagQuery) -> Result<Vec<SubQuery>, RagError> {
        validate_query(query)?;

        let constraints = &query.constraints;
        let text = query.text.trim();
        let mut terms = extract_keywords(text, MAX_QUERY_TERMS);
        if terms.is_empty() {
            // Nothing but stopwords or punctuation; search for the phrase itself
            terms.push(normalize_text(text));
        }

        let sub_queries: Vec<SubQuery> = self
            .backends
            .iter()
            .filter(|(kind, _)| !constraints.disabled_backends.contains(kind))
            .map(|(kind, defaults)| {
                let limit = constraints
                    .max_results_per_backend
                    .unwrap_or(defaults.top_k);
                let timeout = constraints.per_backend_timeout.unwrap_or(defaults.timeout);

                let payload = match kind {
                    BackendKind::Vector => SubQueryPayload::Vector {
                        text: text.to_string(),
                        top_k: limit,
                    },
                    BackendKind::Graph => SubQueryPayload::Graph {
                        seeds: terms.clone(),
                        max_depth: self.graph_max_depth,
                        limit,
                    },
                    BackendKind::Relational => SubQueryPayload::Relational {
                        terms: terms.clone(),
                        limit,
                    },
                };

                SubQuery::new(payload, timeout)
            })
            .collect();

        debug!(
            "Planned {} sub-queries ({} disabled) for query of {} chars",
            sub_queries.len(),
            constraints.disabled_backends.len(),
            text.len()
        );

        Ok(sub_queries)
    }
}

fn validate_query(query: &RagQuery) -> Result<(), RagError> {
    let text = query.text.trim();
    if text.is_empty() {
        return Err(RagError::invalid_query("query text must not be empty"));
    }
    if text.chars().count() > MAX_QUERY_CHARS {
        return Err(RagError::invalid_query(format!(
            "query text too long (max {} characters)",
            MAX_QUERY_CHARS
        )));
    }

    let constraints = &query.constraints;
    if constraints.max_results_per_backend == Some(0) {
        return Err(RagError::invalid_query("maxResultsPerBackend must be at least 1"));
    }
    if constraints.max_fragments == Some(0) {
        return Err(RagError::invalid_query("maxFragments must be at least 1"));
    }
    if constraints.per_backend_timeout == Some(Duration::ZERO) {
        return Err(RagError::invalid_query("perBackendTimeoutMs must be greater than 0"));
    }
    if constraints.overall_timeout == Some(Duration::ZERO) {
        return Err(RagError::invalid_query("overallTimeoutMs must be greater than 0"));
    }

    Ok(())
}
