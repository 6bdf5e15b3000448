// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Retrieval-augmented context assembly
//!
//! A query is planned into per-backend sub-queries, fanned out concurrently
//! and the surviving results merged into one ranked context.

pub mod errors;
pub mod keywords;
pub mod merger;
pub mod orchestrator;
pub mod planner;
pub mod service;
pub mod types;

pub use errors::RagError;
pub use merger::{MergeConfig, NormalizationPolicy, ResultMerger, ScoreNormalization};
pub use orchestrator::FanOutOrchestrator;
pub use planner::{BackendDefaults, QueryPlanner};
pub use service::RagService;
pub use types::{
    BackendKind, BackendResult, BackendResults, BackendStatus, ContextFragment, ErrorKind,
    QueryConstraints, RagContext, RagOutcome, RagQuery, ScoredFragment, SubQuery, SubQueryPayload,
};
