//! Vigil - cluster health checks and alert delivery
//!
//! ## Usage
//!
//! ```bash
//! # Evaluate an exported cluster snapshot every 30 seconds
//! vigil watch --snapshot cluster.json
//!
//! # One evaluation, then exit
//! vigil watch --snapshot cluster.json --once
//!
//! # Send a test alert through every enabled channel
//! vigil notify-test
//!
//! # Show notification settings
//! vigil config show
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use vigil_alerts::{AlertStore, AlertStoreConfig, NotificationDispatcher};
use vigil_core::{LogGuard, VigilError, init_logging, paths};
use vigil_health::{ClusterHealth, HealthEngine, HealthEngineConfig, SnapshotClient, checks};

/// Cluster health evaluation and alert delivery
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory for log files (defaults to ~/.vigil/logs/)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Notification settings file (defaults to ~/.vigil/notifications.json)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run health checks against a cluster snapshot file
    Watch {
        /// JSON cluster snapshot, re-read every cycle
        #[arg(long)]
        snapshot: PathBuf,

        /// Seconds between cycles
        #[arg(long, default_value_t = vigil_health::engine::DEFAULT_CHECK_INTERVAL_SECS)]
        interval: u64,

        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Send a test notification through every enabled channel
    NotifyTest,
    /// Inspect notification settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective settings as JSON
    Show,
    /// Print the settings file location
    Path,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(1);
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("vigil error: {:#}", e);
            eprintln!("Error: {:#}", e);
            if let Some(hint) = e.downcast_ref::<VigilError>().and_then(VigilError::guidance) {
                eprintln!("Hint: {hint}");
            }
            ExitCode::from(1)
        }
    }
}

/// Set up logging based on CLI arguments.
fn setup_logging(cli: &Cli) -> vigil_core::Result<LogGuard> {
    init_logging(cli.log_dir.clone(), cli.verbose > 0)
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => paths::default_config_path().context("cannot locate notification settings")?,
    };

    match cli.command {
        Command::Watch {
            snapshot,
            interval,
            once,
        } => watch(config_path, snapshot, Duration::from_secs(interval), once).await,
        Command::NotifyTest => {
            let dispatcher = NotificationDispatcher::new(&config_path);
            for (name, enabled) in dispatcher.channel_status() {
                println!("{:<16} {}", name, if enabled { "enabled" } else { "disabled" });
            }
            dispatcher
                .send_test_notification()
                .await
                .context("test notification could not be logged")?;
            println!("Test notification sent.");
            Ok(())
        }
        Command::Config { action } => {
            match action {
                ConfigAction::Path => println!("{}", config_path.display()),
                ConfigAction::Show => {
                    let dispatcher = NotificationDispatcher::new(&config_path);
                    let json = serde_json::to_string_pretty(dispatcher.get_config().as_ref())
                        .context("cannot render settings")?;
                    println!("{json}");
                }
            }
            Ok(())
        }
    }
}

async fn watch(
    config_path: PathBuf,
    snapshot: PathBuf,
    interval: Duration,
    once: bool,
) -> Result<()> {
    let dispatcher = Arc::new(NotificationDispatcher::new(&config_path));
    let store = Arc::new(AlertStore::new(AlertStoreConfig::default()));
    store.on_alert(|alert| println!("{}", alert.format_detail()));

    let client = Arc::new(SnapshotClient::new(&snapshot));
    let engine = Arc::new(HealthEngine::new(
        client,
        Arc::clone(&store),
        HealthEngineConfig::with_interval(interval),
    ));
    checks::register_defaults(&engine);

    if once {
        // Deliver inline so every notification finishes before exit.
        let health = engine.run_cycle().await;
        for alert in store.get_unacknowledged().iter().rev() {
            if let Err(e) = dispatcher.notify(alert).await {
                error!(alert_id = %alert.id, error = %e, "alert delivery incomplete");
            }
        }
        print_health(&health);
        return Ok(());
    }

    store.set_notifier(dispatcher);
    info!(snapshot = %snapshot.display(), "watching cluster snapshot");
    engine.start();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    info!("shutting down");
    engine.stop().await;
    print_health(&engine.get_health());
    Ok(())
}

fn print_health(health: &ClusterHealth) {
    println!(
        "\nOverall: {} (updated {})",
        health.overall_status,
        health.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for check in health.checks.values() {
        println!("  {:<12} {:<8} {}", check.name, check.status.to_string(), check.message);
    }
    for issue in &health.issues {
        println!(
            "  ! {} (seen {}x since {})",
            issue.title,
            issue.occurrences,
            issue.first_seen.format("%H:%M:%S")
        );
    }
}
