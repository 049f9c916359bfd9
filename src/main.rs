// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use anyhow::{Context, Result};
use archive_agent::app::{create_router, AppState};
use archive_agent::config::{AgentConfig, VERSION};
use archive_agent::models::archive::ArchiveResponse;
use archive_agent::services::comparator;
use archive_agent::services::crawler::{Archiver, CrawlLimits};
use archive_agent::services::fetcher::Fetcher;
use archive_agent::services::logging;
use archive_agent::services::store::SnapshotStore;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "archive-agent", version = VERSION, about = "Website snapshot archiver")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Archive a site once and print the outcome as JSON
    Archive {
        /// Seed URL
        url: String,
    },
    /// List snapshot timestamps of a domain, newest first
    List { domain: String },
    /// Compare one page between two snapshots and print the result as JSON
    Compare {
        domain: String,
        timestamp1: String,
        timestamp2: String,
        /// Page path relative to the snapshot root, e.g. `index.html`
        #[arg(default_value = "index.html")]
        path: String,
    },
}

fn build_archiver(config: &AgentConfig) -> Result<Archiver> {
    let fetcher = Fetcher::new(&config.user_agent, config.fetch_timeout)
        .context("Failed to build HTTP client")?;
    let limits = CrawlLimits {
        max_pages: config.max_pages,
        time_budget: config.crawl_timeout,
    };

    Ok(Archiver::new(
        fetcher,
        SnapshotStore::new(&config.archive_dir),
        limits,
    ))
}

async fn serve(config: AgentConfig, archiver: Archiver) -> Result<()> {
    info!(
        "archive-agent {} storing snapshots in {}",
        VERSION,
        archiver.store().root().display()
    );

    let app = create_router(AppState::new(archiver), config.cors_enabled);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("Listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    let config = AgentConfig::from_env().context("Invalid configuration")?;
    let archiver = build_archiver(&config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, archiver).await,
        Command::Archive { url } => {
            let response = match archiver.archive(&url).await {
                Ok(outcome) => ArchiveResponse::from(outcome),
                Err(e) => ArchiveResponse::Error {
                    message: e.to_string(),
                },
            };
            print_json(&response)
        }
        Command::List { domain } => {
            for timestamp in archiver.store().list_versions(&domain).await {
                println!("{}", timestamp);
            }
            Ok(())
        }
        Command::Compare {
            domain,
            timestamp1,
            timestamp2,
            path,
        } => {
            let result =
                comparator::compare(archiver.store(), &domain, &timestamp1, &timestamp2, &path)
                    .await?;
            print_json(&result)
        }
    }
}
