// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Fabstir RAG Node

/// Full version string with feature description
pub const VERSION: &str = "v1.0.0-rag-fanout-2025-11-02";

/// Semantic version number
pub const VERSION_NUMBER: &str = "1.0.0";

/// Build date
pub const BUILD_DATE: &str = "2025-11-02";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "vector-backend",
    "graph-backend",
    "relational-backend",
    "concurrent-fanout",
    "per-backend-timeouts",
    "transient-retry",
    "score-normalization",
    "fingerprint-dedup",
    "partial-results",
    "health-checks",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Fabstir RAG Node {} ({})", VERSION_NUMBER, BUILD_DATE)
}
