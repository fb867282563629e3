//! Command-line entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{ArgAction, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use strmsync_core::provider::DebridClient;
use strmsync_core::sync::{format_summary, RunResult, SummaryOptions, SyncService};
use strmsync_core::{load_config, Config};

#[derive(Parser)]
#[command(
    name = "strmsync",
    version,
    disable_version_flag = true,
    about = "Keeps a local .strm library in sync with a debrid provider"
)]
struct Cli {
    /// Path to config file
    #[arg(short = 'c', long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Print version
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: (),

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one sync cycle and exit
    Run,
    /// Show what would happen without making changes
    #[command(name = "dry-run", alias = "dryrun")]
    DryRun,
    /// Run sync cycles continuously
    Watch,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    // Config problems are reported before logging is up.
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            return ExitCode::from(1);
        }
    };

    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(command: Command, config: Config) -> Result<()> {
    let config = Arc::new(config);
    let provider = Arc::new(DebridClient::new(&config).context("building provider client")?);
    let service = SyncService::new(Arc::clone(&config), provider);

    match command {
        Command::Run => {
            info!("Starting single sync run");
            let result = service.run(false).await.context("sync failed")?;
            report_completion(&result, false);
        }
        Command::DryRun => {
            info!("Starting dry run (no changes will be made)");
            let result = service.run(true).await.context("dry run failed")?;
            report_completion(&result, true);
        }
        Command::Watch => {
            info!(
                interval_secs = config.watch_mode_interval,
                "Starting watch mode"
            );
            service.watch().await.context("watch mode failed")?;
        }
    }

    Ok(())
}

fn report_completion(result: &RunResult, dry_run: bool) {
    let opts = SummaryOptions {
        dry_run,
        ..Default::default()
    };
    info!("{}", format_summary(result, &opts));

    let mode = if dry_run { "Dry run" } else { "Sync" };
    info!("{mode} complete in {:.2?}", result.duration);
    info!(
        "  Torrents: {} total, {} downloaded, {} dead, {} repaired",
        result.torrents_total,
        result.torrents_downloaded,
        result.torrents_dead,
        result.torrents_repaired
    );
    info!(
        "  Links: {} unrestricted, {} failed, {} queued",
        result.links_unrestricted, result.links_failed, result.links_queued
    );
    info!(
        "  STRM: {} added, {} updated, {} deleted, {} unchanged",
        result.strm_added, result.strm_updated, result.strm_deleted, result.strm_skipped
    );
    if let Some(org) = &result.organizer {
        info!(
            "  Organized: {} processed, {} new, {} updated, {} deleted, {} errors",
            org.processed, org.new, org.updated, org.deleted, org.errors
        );
    }
}
