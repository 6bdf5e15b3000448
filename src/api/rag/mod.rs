// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Retrieval context API endpoint
//!
//! Provides the `/v1/rag/context` HTTP endpoint (GetRAGContext).

pub mod handler;
pub mod request;
pub mod response;

pub use handler::rag_context_handler;
pub use request::{RagContextOptions, RagContextRequest};
pub use response::{FragmentResponse, HealthResponse, RagContextResponse};
