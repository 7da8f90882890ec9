//! droplift - snapshot-backed server lifecycle CLI
//!
//! Thin front end over the lifecycle engine; every subcommand maps to one
//! engine operation.
//!
//! ```bash
//! # Show all servers (live droplets + snapshot lineages)
//! droplift list
//!
//! # Boot a server from its latest snapshot
//! droplift start minecraft
//!
//! # Snapshot a running server and tear it down
//! droplift end minecraft
//!
//! # Inspect and prune a snapshot lineage
//! droplift snapshots minecraft
//! droplift cleanup minecraft --keep 3
//! ```
//!
//! Configuration is read from a JSON settings file (`settings.json` by
//! default); the API token can also come from `DO_API_TOKEN`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use droplift::{
    DoApiClient, EngineConfig, ServerEngine, StdoutReporter, DEFAULT_KEEP_COUNT,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Droplift: ephemeral servers materialized from snapshots on demand
#[derive(Parser)]
#[command(name = "droplift")]
#[command(about = "Snapshot-backed droplet lifecycle orchestration", long_about = None)]
struct Cli {
    /// Path to the JSON settings file
    #[arg(long, global = true, default_value = "settings.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every server: running, provisioning, or stopped-with-snapshot
    List,

    /// Boot a server from the latest snapshot of its lineage
    Start {
        /// Logical server name
        name: String,
    },

    /// Snapshot a running server, then tear the droplet down
    End {
        /// Logical server name
        name: String,
    },

    /// List a server's snapshot lineage, newest first
    Snapshots {
        /// Logical server name
        name: String,
    },

    /// Delete all but the newest snapshots of a server
    Cleanup {
        /// Logical server name
        name: String,

        /// How many snapshots to retain
        #[arg(long, default_value_t = DEFAULT_KEEP_COUNT)]
        keep: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "droplift=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = EngineConfig::load(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    let client = DoApiClient::new(&config.api_token).with_base_url(&config.api_base);
    let engine = ServerEngine::new(Arc::new(client), Arc::new(StdoutReporter), config);

    let ok = match cli.command {
        Commands::List => {
            engine.list().await?;
            true
        }
        Commands::Start { name } => engine.start(&name).await?.started(),
        Commands::End { name } => {
            matches!(engine.end(&name).await?, droplift::EndOutcome::Ended)
        }
        Commands::Snapshots { name } => engine.snapshot_list(&name).await?,
        Commands::Cleanup { name, keep } => {
            matches!(
                engine.cleanup(&name, keep).await?,
                droplift::CleanupOutcome::Done { failed: 0, .. }
            )
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
