// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for context retrieval
//!
//! Only two conditions abort a request: a malformed query and a plan with
//! nothing to dispatch. Per-backend problems never surface here; they are
//! folded into the response as `BackendResult::Failure` or `Timeout`.

use thiserror::Error;

/// Request-level errors for GetRAGContext
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RagError {
    /// The query was rejected before any backend was contacted
    #[error("Invalid query: {reason}")]
    InvalidQuery { reason: String },

    /// The planner produced no sub-queries (nothing configured or everything disabled)
    #[error("No retrieval backends configured for this request")]
    NoBackendsConfigured,

    /// Startup configuration could not be turned into a working service
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    pub fn invalid_query(reason: impl Into<String>) -> Self {
        RagError::InvalidQuery {
            reason: reason.into(),
        }
    }

    /// Get error code for logging and API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            RagError::InvalidQuery { .. } => "invalid_query",
            RagError::NoBackendsConfigured => "no_backends_configured",
            RagError::Config(_) => "configuration_error",
        }
    }

    /// Whether the caller is at fault (4xx-equivalent)
    pub fn is_client_error(&self) -> bool {
        matches!(self, RagError::InvalidQuery { .. })
    }
}
