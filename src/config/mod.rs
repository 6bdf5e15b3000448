// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-wide configuration
//!
//! Loaded once at startup from environment variables (`from_env`) or a TOML
//! file (`from_toml_file`). A backend section that is absent means that
//! backend is not configured.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::backends::adapter::RetryPolicy;
use crate::backends::pool::PoolSettings;
use crate::backends::relational::is_valid_identifier;
use crate::rag::errors::RagError;
use crate::rag::merger::{MergeConfig, ScoreNormalization};
use crate::rag::planner::BackendDefaults;
use crate::rag::types::BackendKind;

const REDACTED: &str = "****";

/// HTTP listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Query embedding for the vector backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding service base URL; `None` selects the offline hashing embedder
    pub url: Option<String>,
    pub model: String,
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: None,
            model: "all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
        }
    }
}

/// Qdrant-compatible vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub url: String,
    pub collection: String,
    /// Payload field holding the fragment text
    pub text_field: String,
    pub top_k: usize,
    pub timeout_ms: u64,
    pub embedding: EmbeddingConfig,
    pub pool: PoolSettings,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "documents".to_string(),
            text_field: "text".to_string(),
            top_k: 10,
            timeout_ms: 1_000,
            embedding: EmbeddingConfig::default(),
            pool: PoolSettings::default(),
        }
    }
}

/// Neo4j graph store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphStoreConfig {
    pub url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Node property matched against seed terms
    pub match_property: String,
    /// Node property returned as fragment text
    pub text_property: String,
    pub top_k: usize,
    pub timeout_ms: u64,
    pub max_depth: u8,
    pub pool: PoolSettings,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:7474".to_string(),
            database: "neo4j".to_string(),
            username: None,
            password: None,
            match_property: "name".to_string(),
            text_property: "text".to_string(),
            top_k: 10,
            timeout_ms: 1_000,
            max_depth: 2,
            pool: PoolSettings::default(),
        }
    }
}

/// PostgreSQL relational store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationalStoreConfig {
    pub database_url: String,
    pub table: String,
    pub text_column: String,
    pub top_k: usize,
    pub timeout_ms: u64,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl Default for RelationalStoreConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost:5432/rag".to_string(),
            table: "documents".to_string(),
            text_column: "content".to_string(),
            top_k: 10,
            timeout_ms: 1_000,
            max_connections: 10,
            acquire_timeout_ms: 1_000,
        }
    }
}

/// Fan-out deadlines and retry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub overall_timeout_ms: u64,
    pub retry_backoff_ms: u64,
    pub max_retries: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            overall_timeout_ms: 2_000,
            retry_backoff_ms: 50,
            max_retries: 1,
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub server: ServerConfig,
    pub vector: Option<VectorStoreConfig>,
    pub graph: Option<GraphStoreConfig>,
    pub relational: Option<RelationalStoreConfig>,
    pub orchestrator: OrchestratorConfig,
    pub merge: MergeConfig,
}

fn parse_or<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_normalization(value: &str) -> Option<ScoreNormalization> {
    match value.trim().to_ascii_lowercase().as_str() {
        "auto" => Some(ScoreNormalization::Auto),
        "pass_through" | "passthrough" => Some(ScoreNormalization::PassThrough),
        "min_max" | "minmax" => Some(ScoreNormalization::MinMax),
        _ => None,
    }
}

fn validate_http_url(section: &str, value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| format!("{}: invalid URL '{}': {}", section, value, e))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("{}: unsupported URL scheme '{}'", section, other)),
    }
}

fn is_simple_name(name: &str) -> bool {
    !name.contains('.') && is_valid_identifier(name)
}

impl RagConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup (environment, test maps)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let server_defaults = ServerConfig::default();
        let server = ServerConfig {
            host: lookup("RAG_HOST").unwrap_or(server_defaults.host),
            port: parse_or(&lookup, "RAG_PORT", server_defaults.port),
        };

        let vector = lookup("VECTOR_STORE_URL").map(|url| {
            let d = VectorStoreConfig::default();
            VectorStoreConfig {
                url,
                collection: lookup("VECTOR_COLLECTION").unwrap_or(d.collection),
                text_field: lookup("VECTOR_TEXT_FIELD").unwrap_or(d.text_field),
                top_k: parse_or(&lookup, "VECTOR_TOP_K", d.top_k),
                timeout_ms: parse_or(&lookup, "VECTOR_TIMEOUT_MS", d.timeout_ms),
                embedding: EmbeddingConfig {
                    url: lookup("EMBEDDING_URL"),
                    model: lookup("EMBEDDING_MODEL").unwrap_or(d.embedding.model),
                    dimensions: parse_or(&lookup, "EMBEDDING_DIMENSIONS", d.embedding.dimensions),
                },
                pool: PoolSettings {
                    max_connections: parse_or(&lookup, "VECTOR_POOL_SIZE", d.pool.max_connections),
                    ..d.pool
                },
            }
        });

        let graph = lookup("GRAPH_STORE_URL").map(|url| {
            let d = GraphStoreConfig::default();
            GraphStoreConfig {
                url,
                database: lookup("GRAPH_DATABASE").unwrap_or(d.database),
                username: lookup("GRAPH_USER"),
                password: lookup("GRAPH_PASSWORD"),
                match_property: lookup("GRAPH_MATCH_PROPERTY").unwrap_or(d.match_property),
                text_property: lookup("GRAPH_TEXT_PROPERTY").unwrap_or(d.text_property),
                top_k: parse_or(&lookup, "GRAPH_TOP_K", d.top_k),
                timeout_ms: parse_or(&lookup, "GRAPH_TIMEOUT_MS", d.timeout_ms),
                max_depth: parse_or(&lookup, "GRAPH_MAX_DEPTH", d.max_depth),
                pool: PoolSettings {
                    max_connections: parse_or(&lookup, "GRAPH_POOL_SIZE", d.pool.max_connections),
                    ..d.pool
                },
            }
        });

        let relational = lookup("RELATIONAL_DATABASE_URL").map(|database_url| {
            let d = RelationalStoreConfig::default();
            RelationalStoreConfig {
                database_url,
                table: lookup("RELATIONAL_TABLE").unwrap_or(d.table),
                text_column: lookup("RELATIONAL_TEXT_COLUMN").unwrap_or(d.text_column),
                top_k: parse_or(&lookup, "RELATIONAL_TOP_K", d.top_k),
                timeout_ms: parse_or(&lookup, "RELATIONAL_TIMEOUT_MS", d.timeout_ms),
                max_connections: parse_or(&lookup, "RELATIONAL_POOL_SIZE", d.max_connections),
                acquire_timeout_ms: d.acquire_timeout_ms,
            }
        });

        let o = OrchestratorConfig::default();
        let orchestrator = OrchestratorConfig {
            overall_timeout_ms: parse_or(&lookup, "RAG_OVERALL_TIMEOUT_MS", o.overall_timeout_ms),
            retry_backoff_ms: parse_or(&lookup, "RAG_RETRY_BACKOFF_MS", o.retry_backoff_ms),
            max_retries: parse_or(&lookup, "RAG_MAX_RETRIES", o.max_retries),
        };

        let mut merge = MergeConfig {
            max_fragments: parse_or(&lookup, "RAG_MAX_FRAGMENTS", MergeConfig::default().max_fragments),
            max_context_tokens: lookup("RAG_MAX_CONTEXT_TOKENS").and_then(|v| v.parse().ok()),
            ..Default::default()
        };
        if let Some(mode) = lookup("VECTOR_SCORE_NORMALIZATION").as_deref().and_then(parse_normalization) {
            merge.normalization.vector = mode;
        }
        if let Some(mode) = lookup("GRAPH_SCORE_NORMALIZATION").as_deref().and_then(parse_normalization) {
            merge.normalization.graph = mode;
        }
        if let Some(mode) = lookup("RELATIONAL_SCORE_NORMALIZATION").as_deref().and_then(parse_normalization) {
            merge.normalization.relational = mode;
        }

        Self {
            server,
            vector,
            graph,
            relational,
            orchestrator,
            merge,
        }
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, RagError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RagError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| RagError::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Load from `path` when given, otherwise from the environment (and `.env`), then validate
    pub fn load(path: Option<&Path>) -> Result<Self, RagError> {
        dotenv::dotenv().ok();
        let config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::from_env(),
        };
        config.validate().map_err(RagError::Config)?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.server.host.trim().is_empty() {
            return Err("server.host must not be empty".to_string());
        }

        if let Some(v) = &self.vector {
            validate_http_url("vector.url", &v.url)?;
            if v.collection.is_empty()
                || !v.collection.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(format!("vector.collection '{}' is not a valid name", v.collection));
            }
            if v.text_field.is_empty() {
                return Err("vector.text_field must not be empty".to_string());
            }
            if v.top_k == 0 || v.timeout_ms == 0 {
                return Err("vector.top_k and vector.timeout_ms must be greater than 0".to_string());
            }
            if let Some(url) = &v.embedding.url {
                validate_http_url("vector.embedding.url", url)?;
            }
            if v.embedding.dimensions == 0 {
                return Err("vector.embedding.dimensions must be greater than 0".to_string());
            }
            v.pool.validate("vector")?;
        }

        if let Some(g) = &self.graph {
            validate_http_url("graph.url", &g.url)?;
            if !is_simple_name(&g.database) {
                return Err(format!("graph.database '{}' is not a valid name", g.database));
            }
            if !is_simple_name(&g.match_property) || !is_simple_name(&g.text_property) {
                return Err("graph.match_property and graph.text_property must be identifiers".to_string());
            }
            if g.top_k == 0 || g.timeout_ms == 0 || g.max_depth == 0 {
                return Err("graph.top_k, graph.timeout_ms and graph.max_depth must be greater than 0".to_string());
            }
            if g.username.is_some() != g.password.is_some() {
                return Err("graph.username and graph.password must be set together".to_string());
            }
            g.pool.validate("graph")?;
        }

        if let Some(r) = &self.relational {
            let url = Url::parse(&r.database_url)
                .map_err(|e| format!("relational.database_url is invalid: {}", e))?;
            if !matches!(url.scheme(), "postgres" | "postgresql") {
                return Err(format!("relational.database_url: unsupported scheme '{}'", url.scheme()));
            }
            if !is_valid_identifier(&r.table) || !is_simple_name(&r.text_column) {
                return Err("relational.table and relational.text_column must be identifiers".to_string());
            }
            if r.top_k == 0 || r.timeout_ms == 0 {
                return Err("relational.top_k and relational.timeout_ms must be greater than 0".to_string());
            }
            if r.max_connections == 0 || r.acquire_timeout_ms == 0 {
                return Err("relational pool settings must be greater than 0".to_string());
            }
        }

        if self.orchestrator.overall_timeout_ms == 0 {
            return Err("orchestrator.overall_timeout_ms must be greater than 0".to_string());
        }

        self.merge.validate()
    }

    /// Backends with a configuration section, in priority order
    pub fn configured_backends(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                BackendKind::Vector => self.vector.is_some(),
                BackendKind::Graph => self.graph.is_some(),
                BackendKind::Relational => self.relational.is_some(),
            })
            .collect()
    }

    /// Planner defaults for a backend (built-in defaults when unconfigured)
    pub fn backend_defaults(&self, kind: BackendKind) -> BackendDefaults {
        let (top_k, timeout_ms) = match kind {
            BackendKind::Vector => {
                let v = self.vector.clone().unwrap_or_default();
                (v.top_k, v.timeout_ms)
            }
            BackendKind::Graph => {
                let g = self.graph.clone().unwrap_or_default();
                (g.top_k, g.timeout_ms)
            }
            BackendKind::Relational => {
                let r = self.relational.clone().unwrap_or_default();
                (r.top_k, r.timeout_ms)
            }
        };
        BackendDefaults {
            top_k,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub fn graph_max_depth(&self) -> u8 {
        self.graph
            .as_ref()
            .map(|g| g.max_depth)
            .unwrap_or_else(|| GraphStoreConfig::default().max_depth)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.orchestrator.overall_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.orchestrator.max_retries,
            backoff: Duration::from_millis(self.orchestrator.retry_backoff_ms),
        }
    }

    /// Copy with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(g) = copy.graph.as_mut() {
            if g.password.is_some() {
                g.password = Some(REDACTED.to_string());
            }
        }
        if let Some(r) = copy.relational.as_mut() {
            if let Ok(mut url) = Url::parse(&r.database_url) {
                if url.password().is_some() && url.set_password(Some(REDACTED)).is_ok() {
                    r.database_url = url.to_string();
                }
            }
        }
        copy
    }
}
