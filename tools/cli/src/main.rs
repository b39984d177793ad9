//! listsync CLI - Command line interface for list reconciliation.
//!
//! This tool runs reconciliation between the local SQLite store and the
//! remote list API, either once or on a schedule, and reports link state.

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use listsync_remote::HttpRemoteClient;
use listsync_store::{LocalStore, SqliteStore};
use listsync_sync::{Orchestrator, RunOutcome, SyncConfig, SyncScheduler};

type SqliteOrchestrator = Orchestrator<SqliteStore, HttpRemoteClient>;

#[derive(Parser)]
#[command(name = "listsync")]
#[command(about = "listsync - Two-way sync between local lists and a remote list API")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the remote list API.
    #[arg(long, env = "SYNC_API_BASE_URL")]
    api_url: Option<String>,

    /// Path of the local database.
    #[arg(long, env = "LISTSYNC_DATABASE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation.
    Run,

    /// Reconcile on a schedule until interrupted.
    Watch {
        /// Seconds between runs.
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Show local lists and their link state.
    Status,
}

impl Cli {
    /// Layer flags and environment over the config file.
    fn resolve_config(&self) -> Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => SyncConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => SyncConfig::default(),
        };

        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(path) = &self.database {
            config.database_path = path.clone();
        }
        if let Commands::Watch {
            interval: Some(secs),
        } = self.command
        {
            config.interval_secs = secs;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_target(false).compact())
        .init();

    let config = cli.resolve_config()?;

    match cli.command {
        Commands::Run => cmd_run(&config).await,
        Commands::Watch { .. } => cmd_watch(&config).await,
        Commands::Status => cmd_status(&config),
    }
}

/// Open the local store, creating its directory if needed.
fn open_store(path: &Path) -> Result<SqliteStore> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
    }
    SqliteStore::open(path).with_context(|| format!("Failed to open database {}", path.display()))
}

fn build_orchestrator(config: &SyncConfig) -> Result<SqliteOrchestrator> {
    let store = open_store(&config.database_path)?;
    let remote = HttpRemoteClient::new(
        &config.api_base_url,
        config.request_timeout(),
        config.transport_retry(),
    )
    .context("Failed to create API client")?;

    Ok(Orchestrator::new(Arc::new(store), Arc::new(remote)))
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Skipped => println!("Sync skipped: another run is in progress."),
        RunOutcome::Completed(report) => {
            println!("Sync completed in {:?}", report.duration);
            let counts = &report.counts;
            println!(
                "  Pull: {} created, {} updated, {} deleted",
                counts.pull_creates, counts.pull_updates, counts.pull_deletes
            );
            println!(
                "  Push: {} created, {} updated, {} deleted",
                counts.push_creates, counts.push_updates, counts.push_deletes
            );
            if !report.errors.is_empty() {
                println!("  Errors ({}):", report.errors.len());
                for error in &report.errors {
                    println!("    {}", error);
                }
            }
        }
    }
}

/// Run one reconciliation.
async fn cmd_run(config: &SyncConfig) -> Result<()> {
    info!("Syncing with {}", config.api_base_url);

    let orchestrator = build_orchestrator(config)?;
    let outcome = orchestrator.run().await.context("Sync failed")?;

    print_outcome(&outcome);
    Ok(())
}

/// Reconcile on a schedule until Ctrl-C.
async fn cmd_watch(config: &SyncConfig) -> Result<()> {
    info!(
        "Watching {} every {}s",
        config.api_base_url, config.interval_secs
    );

    let orchestrator = build_orchestrator(config)?;
    let (scheduler, handle) = SyncScheduler::new(config.interval(), config.run_retry());

    let task = tokio::spawn(handle.run_immediately(true).run(move || {
        let orchestrator = orchestrator.clone();
        async move { orchestrator.run().await }
    }));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    println!("\nStopping...");

    scheduler.shutdown().await;
    task.await.context("Scheduler task failed")?;
    Ok(())
}

/// Show local lists and their link state.
fn cmd_status(config: &SyncConfig) -> Result<()> {
    let store = open_store(&config.database_path)?;
    let lists = store.load_all().context("Failed to read local lists")?;

    if lists.is_empty() {
        println!("No local lists.");
        return Ok(());
    }

    println!("Local lists ({}):", lists.len());
    for list in lists {
        let link = list
            .external_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unlinked".to_string());
        let synced = list
            .synced_at
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| "never".to_string());
        let pending = if list.has_pending_changes() { " [pending]" } else { "" };

        println!("  [{}] {} ({} items)", list.id, list.name, list.items.len());
        println!("      remote: {}  synced: {}{}", link, synced, pending);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "listsync",
            "--api-url",
            "http://sync.example:9000",
            "--database",
            "/tmp/lists.db",
            "watch",
            "--interval",
            "15",
        ])
        .unwrap();

        let config = cli.resolve_config().unwrap();

        assert_eq!(config.api_base_url, "http://sync.example:9000");
        assert_eq!(config.database_path, PathBuf::from("/tmp/lists.db"));
        assert_eq!(config.interval_secs, 15);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let cli = Cli::try_parse_from(["listsync", "watch", "--interval", "0"]).unwrap();
        assert!(cli.resolve_config().is_err());
    }

    #[test]
    fn test_open_store_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("listsync.db");

        let store = open_store(&path).unwrap();

        assert!(store.load_all().unwrap().is_empty());
        assert!(path.exists());
    }
}
