// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP/JSON surface for the retrieval service

pub mod errors;
pub mod http_server;
pub mod rag;

pub use errors::{ApiError, ErrorResponse};
pub use http_server::{build_router, start_server, ApiErrorResponse, AppState};
pub use rag::{HealthResponse, RagContextOptions, RagContextRequest, RagContextResponse};
