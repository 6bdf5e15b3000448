// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::api::rag::{HealthResponse, RagContextOptions, RagContextRequest, RagContextResponse};
use crate::config::RagConfig;
use crate::rag::RagService;

/// Arguments for the query command
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Natural-language query
    pub text: String,

    /// Maximum fragments in the merged context
    #[arg(long)]
    pub max_fragments: Option<usize>,

    /// Hits requested from each backend
    #[arg(long)]
    pub max_results_per_backend: Option<usize>,

    /// Backend to skip (repeatable): vector, graph, relational
    #[arg(long)]
    pub disable: Vec<String>,

    /// Per-backend timeout override
    #[arg(long)]
    pub per_backend_timeout_ms: Option<u64>,

    /// Overall deadline override
    #[arg(long)]
    pub overall_timeout_ms: Option<u64>,
}

impl QueryArgs {
    fn to_request(&self) -> RagContextRequest {
        RagContextRequest {
            query: self.text.clone(),
            options: Some(RagContextOptions {
                max_fragments: self.max_fragments,
                max_results_per_backend: self.max_results_per_backend,
                per_backend_timeout_ms: self.per_backend_timeout_ms,
                overall_timeout_ms: self.overall_timeout_ms,
                disabled_backends: self.disable.clone(),
            }),
            request_id: Some(Uuid::new_v4().to_string()),
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RagConfig> {
    RagConfig::load(path).context("failed to load configuration")
}

/// Run GetRAGContext in-process and print the response
pub async fn query(config_path: Option<&Path>, args: QueryArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let service = RagService::from_config(&config)?;

    let request = args.to_request();
    let request_id = request.request_id.clone().unwrap_or_default();
    let query = request.to_query().map_err(|e| anyhow!("{}", e))?;

    info!("Querying {} backends", service.configured_backends().len());
    let outcome = service.get_context(query).await?;

    let response = RagContextResponse::from_outcome(outcome, request_id);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Print backend health
pub async fn health(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let service = RagService::from_config(&config)?;

    let health = HealthResponse::new(service.health().await);
    println!("{}", serde_json::to_string_pretty(&health)?);

    if health.status != "ok" {
        return Err(anyhow!("one or more backends are unhealthy"));
    }
    Ok(())
}

/// Print the effective configuration with secrets masked
pub fn show_config(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let rendered = toml::to_string_pretty(&config.redacted()).context("failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}
