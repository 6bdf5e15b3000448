// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod backends;
pub mod cli;
pub mod config;
pub mod rag;
pub mod version;

// Re-export main types
pub use backends::{build_adapters, BackendAdapter, BackendHealth, StoreAdapter, StoreClient, StoreError};
pub use config::RagConfig;
pub use rag::{
    BackendKind, BackendResult, ErrorKind, FanOutOrchestrator, QueryPlanner, RagContext, RagError,
    RagOutcome, RagQuery, RagService, ResultMerger,
};
