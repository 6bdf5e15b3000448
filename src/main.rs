// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use fabstir_rag_node::{api::start_server, config::RagConfig, rag::RagService};
use std::{env, path::PathBuf};
use tracing::{info, warn};

/// Fabstir RAG Node server
#[derive(Parser, Debug)]
#[command(name = "fabstir-rag-node")]
#[command(version = fabstir_rag_node::version::VERSION_NUMBER)]
struct Args {
    /// TOML configuration file (environment variables are used when absent)
    #[arg(long, env = "RAG_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    info!("{}", fabstir_rag_node::version::get_version_string());
    info!("Build: {}", fabstir_rag_node::version::VERSION);
    info!("Features: {}", fabstir_rag_node::version::FEATURES.join(", "));

    let mut config = RagConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let backends = config.configured_backends();
    if backends.is_empty() {
        warn!("No retrieval backends configured; every request will be rejected with 503");
    } else {
        let names: Vec<&str> = backends.iter().map(|b| b.as_str()).collect();
        info!("Configured backends: {}", names.join(", "));
    }

    let service = RagService::from_config(&config).context("failed to initialise backends")?;

    start_server(&config.server, service).await?;

    info!("Fabstir RAG Node stopped");
    Ok(())
}
