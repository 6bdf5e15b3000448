// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! GetRAGContext request types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::api::errors::ApiError;
use crate::rag::{BackendKind, QueryConstraints, RagQuery};

/// Largest accepted `maxFragments` / `maxResultsPerBackend`
pub const MAX_FRAGMENTS_LIMIT: usize = 200;

/// Largest accepted timeout, in milliseconds
pub const MAX_TIMEOUT_MS: u64 = 60_000;

/// Optional retrieval constraints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagContextOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fragments: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results_per_backend: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_backend_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_timeout_ms: Option<u64>,
    /// Backend names to skip (`vector`, `graph`, `relational`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_backends: Vec<String>,
}

/// Request body for POST /v1/rag/context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagContextRequest {
    /// Natural-language query (required)
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<RagContextOptions>,

    /// Optional request ID for tracking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

fn out_of_range(field: &str, max: impl std::fmt::Display) -> ApiError {
    ApiError::ValidationError {
        field: format!("options.{}", field),
        message: format!("{} must be between 1 and {}", field, max),
    }
}

impl RagContextRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            options: None,
            request_id: None,
        }
    }

    /// Validate options; query text itself is checked by the planner
    pub fn validate(&self) -> Result<(), ApiError> {
        let Some(options) = &self.options else {
            return Ok(());
        };

        if let Some(n) = options.max_fragments {
            if n == 0 || n > MAX_FRAGMENTS_LIMIT {
                return Err(out_of_range("maxFragments", MAX_FRAGMENTS_LIMIT));
            }
        }
        if let Some(n) = options.max_results_per_backend {
            if n == 0 || n > MAX_FRAGMENTS_LIMIT {
                return Err(out_of_range("maxResultsPerBackend", MAX_FRAGMENTS_LIMIT));
            }
        }
        if let Some(ms) = options.per_backend_timeout_ms {
            if ms == 0 || ms > MAX_TIMEOUT_MS {
                return Err(out_of_range("perBackendTimeoutMs", MAX_TIMEOUT_MS));
            }
        }
        if let Some(ms) = options.overall_timeout_ms {
            if ms == 0 || ms > MAX_TIMEOUT_MS {
                return Err(out_of_range("overallTimeoutMs", MAX_TIMEOUT_MS));
            }
        }
        for name in &options.disabled_backends {
            name.parse::<BackendKind>().map_err(|message| ApiError::ValidationError {
                field: "options.disabledBackends".to_string(),
                message,
            })?;
        }
        Ok(())
    }

    /// Validate and convert into a core query
    pub fn to_query(&self) -> Result<RagQuery, ApiError> {
        self.validate()?;

        let options = self.options.clone().unwrap_or_default();
        let disabled_backends: BTreeSet<BackendKind> = options
            .disabled_backends
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect();

        Ok(RagQuery::new(self.query.clone()).with_constraints(QueryConstraints {
            max_results_per_backend: options.max_results_per_backend,
            per_backend_timeout: options.per_backend_timeout_ms.map(Duration::from_millis),
            overall_timeout: options.overall_timeout_ms.map(Duration::from_millis),
            max_fragments: options.max_fragments,
            disabled_backends,
        }))
    }
}
