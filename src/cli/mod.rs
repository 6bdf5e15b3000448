// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Fabstir RAG Node CLI
#[derive(Parser, Debug)]
#[command(name = "rag-cli")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Query and inspect the Fabstir RAG Node backends", long_about = None)]
pub struct Cli {
    /// TOML configuration file (environment variables are used when absent)
    #[arg(long, global = true, env = "RAG_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assemble retrieval context for a query and print the JSON response
    Query(commands::QueryArgs),

    /// Probe every configured backend
    Health,

    /// Print the effective configuration (secrets redacted)
    Config,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Query(args) => commands::query(config_path, args).await,
        Commands::Health => commands::health(config_path).await,
        Commands::Config => commands::show_config(config_path),
    }
}
