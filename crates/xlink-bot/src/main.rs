//! xlink - Entry Point
//!
//! Probes every line of one venue, routes orders over the fastest, and
//! unwinds all positions on exit.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use xlink_bot::{AppConfig, Connector};
use xlink_telemetry::LogAlerter;

/// Multi-line venue connector
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via XLINK_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Run one probe cycle and one unwind against the in-memory venue
    #[arg(long)]
    simulate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Determine config path: CLI arg > XLINK_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("XLINK_CONFIG").ok());
    let config = match (&config_path, args.simulate) {
        (Some(path), _) => AppConfig::load(path)?,
        (None, true) => AppConfig::simulation(),
        (None, false) => AppConfig::load("config/default.toml")?,
    };

    xlink_telemetry::init_logging(Some(&config.log.filter))?;
    info!("Starting xlink v{}", env!("CARGO_PKG_VERSION"));
    info!(config_path = ?config_path, venue = %config.venue.name, pair = %config.venue.pair, "Configuration loaded");

    if args.simulate {
        let summary = xlink_bot::run_simulation(&config).await?;
        println!("{summary}");
        return Ok(());
    }

    let venue = xlink_bot::build_venue(&config.venue)?;
    let alerter = Arc::new(LogAlerter::new(config.log.account.clone()));
    let connector = Connector::new(venue.clone(), &config, alerter, config.log.sink.build())?;
    venue.set_probe_listener(connector.monitor());
    let monitor = connector.spawn_monitor();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        }
        _ = connector.stopped() => warn!("Hard stop tripped"),
    }
    connector.shutdown();
    monitor.await?;

    if config.unwind_on_exit {
        let report = connector.unwind(None).await;
        info!(run_id = %report.run_id, is_left = report.is_left, rounds = report.rounds, "Exit unwind finished");
        if report.is_left {
            anyhow::bail!("positions left open after unwind on {}", config.venue.name);
        }
    }

    Ok(())
}
