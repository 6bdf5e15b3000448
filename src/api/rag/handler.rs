// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! GetRAGContext endpoint handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::request::RagContextRequest;
use super::response::RagContextResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::{ApiErrorResponse, AppState};

/// POST /v1/rag/context - Assemble retrieval context for a query
///
/// # Request
/// - `query`: Natural-language query (required, non-empty)
/// - `options.maxFragments`: Cap on merged fragments (1-200)
/// - `options.maxResultsPerBackend`: Hits requested per backend (1-200)
/// - `options.perBackendTimeoutMs`, `options.overallTimeoutMs`: 1-60000
/// - `options.disabledBackends`: Backends to skip
/// - `requestId`: Optional request ID for tracking
///
/// # Response
/// - `fragments`: Ranked fragments with text, score and provenance
/// - `partial`: Whether any backend failed or timed out
/// - `fragmentCount`, `elapsedMs`, `backends`, `requestId`
///
/// # Errors
/// - 400 Bad Request: malformed body, invalid query or options
/// - 503 Service Unavailable: no backends left to query
pub async fn rag_context_handler(
    State(state): State<AppState>,
    payload: Result<Json<RagContextRequest>, JsonRejection>,
) -> Result<Json<RagContextResponse>, ApiErrorResponse> {
    let Json(request) = payload
        .map_err(|e| ApiErrorResponse::new(ApiError::InvalidRequest(e.body_text()), None))?;

    let request_id = request
        .request_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    debug!("[{}] RAG context request: {:?}", request_id, request.query);

    let query = request.to_query().map_err(|e| {
        warn!("[{}] RAG request validation failed: {}", request_id, e);
        ApiErrorResponse::new(e, Some(request_id.clone()))
    })?;

    let outcome = state.service.get_context(query).await.map_err(|e| {
        warn!("[{}] RAG request rejected: {}", request_id, e);
        ApiErrorResponse::new(e.into(), Some(request_id.clone()))
    })?;

    info!(
        "[{}] RAG context: {} fragments in {}ms (partial: {})",
        request_id,
        outcome.context.len(),
        outcome.elapsed_ms,
        outcome.partial
    );

    Ok(Json(RagContextResponse::from_outcome(outcome, request_id)))
}
