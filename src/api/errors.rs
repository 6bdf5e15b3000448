// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::rag::RagError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    pub request_id: Option<String>,
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Body could not be parsed
    InvalidRequest(String),
    /// Query rejected by the planner
    InvalidQuery(String),
    /// A request field is out of range or unknown
    ValidationError { field: String, message: String },
    NoBackendsConfigured,
    NotFound(String),
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self, request_id: Option<String>) -> ErrorResponse {
        let (error_type, message, details) = match self {
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone(), None),
            ApiError::InvalidQuery(msg) => ("invalid_query", msg.clone(), None),
            ApiError::ValidationError { field, message } => {
                let mut details = HashMap::new();
                details.insert(
                    "field".to_string(),
                    serde_json::Value::String(field.clone()),
                );
                ("invalid_query", message.clone(), Some(details))
            }
            ApiError::NoBackendsConfigured => (
                "no_backends_configured",
                "No retrieval backends are configured for this request".to_string(),
                None,
            ),
            ApiError::NotFound(msg) => ("not_found", msg.clone(), None),
            ApiError::InternalError(msg) => ("internal_error", msg.clone(), None),
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            message,
            request_id,
            details,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_)
            | ApiError::InvalidQuery(_)
            | ApiError::ValidationError { .. } => 400,
            ApiError::NotFound(_) => 404,
            ApiError::NoBackendsConfigured => 503,
            ApiError::InternalError(_) => 500,
        }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::InvalidQuery { reason } => ApiError::InvalidQuery(reason),
            RagError::NoBackendsConfigured => ApiError::NoBackendsConfigured,
            RagError::Config(msg) => ApiError::InternalError(msg),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::InvalidQuery(msg) => write!(f, "Invalid query: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::NoBackendsConfigured => write!(f, "No retrieval backends configured"),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}
