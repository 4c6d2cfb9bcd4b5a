mod cell;
mod config;
mod diff;
mod error;
mod monitor;
mod probe;
mod source;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::{watch, Notify};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use monitor::{Monitor, StopReason};
use source::AnySource;
use store::{ActivityLog, JsonFileStore};

#[derive(Parser)]
#[command(name = "towerlink")]
#[command(about = "Cell tower monitor: shows serving/neighbor cells and logs tower changes")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the cell-info source and log connect/disconnect transitions
    Monitor,
    /// Scan once and print the towers grouped by network
    Probe {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the activity log, newest first
    Log {
        /// Only print the newest N entries
        #[arg(short = 'n', long)]
        lines: Option<usize>,
    },
    /// Print every tower key seen so far
    Towers,
    /// Wipe the activity log and the unique tower set
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config from {:?}: {}", cli.config, e);
        eprintln!("Using default configuration");
        config::Config::default()
    });

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let open_log = || -> anyhow::Result<ActivityLog<JsonFileStore>> {
        let store = JsonFileStore::open(&config.store.path)
            .with_context(|| format!("Failed to open store {:?}", config.store.path))?;
        Ok(ActivityLog::new(store, config.monitor.max_log_lines))
    };

    match cli.command {
        Command::Monitor => {
            info!("TowerLink v{}", env!("CARGO_PKG_VERSION"));

            let source = AnySource::from_config(&config.source)?;
            let mut monitor = Monitor::new(
                source,
                open_log()?,
                config.platform.api_level,
                config.monitor.interval(),
            );

            let (stop_tx, stop_rx) = watch::channel(false);
            let refresh = Arc::new(Notify::new());
            spawn_signal_handlers(stop_tx, refresh.clone());

            info!("Monitor running. Press Ctrl+C to stop.");
            match monitor.run(stop_rx, refresh).await {
                StopReason::Requested => info!("Shutting down..."),
                StopReason::PermissionRevoked => {
                    anyhow::bail!("Location permission revoked, monitor cannot continue");
                }
            }
        }

        Command::Probe { json } => {
            let mut source = AnySource::from_config(&config.source)?;
            let state = probe::probe(&mut source, config.platform.api_level).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                print_probe(&state);
            }
            if state.error.is_some() {
                std::process::exit(1);
            }
        }

        Command::Log { lines } => {
            let log = open_log()?;
            let entries = log.entries()?;
            let count = lines.unwrap_or(entries.len());
            for entry in entries.iter().take(count) {
                println!("{}", entry);
            }
        }

        Command::Towers => {
            let log = open_log()?;
            let towers = log.towers()?;
            for key in &towers {
                println!("{}", key);
            }
            eprintln!("{} unique tower(s)", towers.len());
        }

        Command::Clear => {
            let mut log = open_log()?;
            log.clear()?;
            info!("Cleared activity log and tower set in {:?}", log.store().path());
        }
    }

    Ok(())
}

/// Ctrl+C stops the monitor; on Unix, SIGUSR1 requests an immediate scan
fn spawn_signal_handlers(stop_tx: watch::Sender<bool>, refresh: Arc<Notify>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Keep the sender alive: a dropped sender reads as a stop request
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Stop requested");
        let _ = stop_tx.send(true);
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut usr1 = match signal(SignalKind::user_defined1()) {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to listen for SIGUSR1: {}", e);
                return;
            }
        };
        while usr1.recv().await.is_some() {
            info!("Manual refresh requested");
            refresh.notify_one();
        }
    });

    #[cfg(not(unix))]
    drop(refresh);
}

fn print_probe(state: &probe::ProbeState) {
    if let Some(ref error) = state.error {
        println!("Error: {}", error);
        return;
    }

    for sim in &state.sims {
        println!("Network {} ({} tower(s))", sim.network_identifier, sim.towers.len());
        for tower in &sim.towers {
            println!(
                "  {:<6} {:<10} {:<28} {}",
                tower.technology.to_string(),
                tower.status.to_string(),
                tower.composite_key(),
                tower
                    .signal_dbm
                    .map(|dbm| format!("{} dBm", dbm))
                    .unwrap_or("-".to_string()),
            );
        }
    }
}
