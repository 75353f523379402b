// crates/tessera-daemon/src/main.rs
//
// Binary entrypoint for the Tessera node daemon.
//
// Initializes tracing, parses CLI arguments, loads configuration, resolves
// the local identity, and runs the local trust reporting pipeline: epoch
// scheduler -> epoch reporter -> report worker pool -> sinks.

mod aggregator;
mod config;
mod epoch_events;
mod identity;
mod netmap;
mod pool;
mod reporter;
mod scheduler;
mod shared;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::{broadcast, watch};

use aggregator::HttpAggregatorTarget;
use config::DaemonConfig;
use epoch_events::EpochEvent;
use identity::KeyOrigin;
use netmap::{CachedNetworkMap, StaticNetworkMap};
use pool::ReportPool;
use reporter::EpochReporter;
use scheduler::EpochScheduler;
use shared::DaemonSharedState;
use tessera_reputation::{FanoutTarget, LogTarget, Target};

/// Tessera node daemon: computes and reports local trust every epoch.
#[derive(Parser, Debug)]
#[command(name = "tessera-daemon", version = "0.1.0", about = "Tessera storage node daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.tessera/config.toml")]
    config: String,

    /// Hex public key identifying this node (overrides the config file).
    #[arg(long)]
    local_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration from TOML file, falling back to defaults if the file
    // is not found. Logged once tracing is up.
    let config_path = identity::expand_tilde(&args.config);
    let loaded = DaemonConfig::load(&config_path);
    let daemon_config = match &loaded {
        Ok(cfg) => cfg.clone(),
        Err(_) => DaemonConfig::default(),
    };

    // Initialize tracing subscriber for structured logging. RUST_LOG wins
    // over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&daemon_config.log_level)),
        )
        .init();

    match loaded {
        Ok(_) => tracing::info!("Loaded configuration from {}", config_path),
        Err(e) => tracing::warn!("{}. Using defaults.", e),
    }

    tracing::info!("Tessera Daemon v0.1.0");
    tracing::info!("Epoch interval: {}s", daemon_config.epoch_interval_secs);
    tracing::info!(
        "Report workers: {} (backlog {})",
        daemon_config.report_workers,
        daemon_config.report_backlog
    );

    let (local_key, origin) = identity::load_local_key(args.local_key.as_deref(), &daemon_config)?;
    match origin {
        KeyOrigin::Ephemeral => tracing::warn!(
            "Running with ephemeral identity {}: no key configured and no hotkey at {}",
            local_key,
            daemon_config.hotkey_path
        ),
        _ => tracing::info!("Local identity: {} ({:?})", local_key, origin),
    }

    let static_map = StaticNetworkMap::new(daemon_config.roster_peers()?);
    if static_map.is_empty() {
        tracing::warn!("Empty network map: the uniform fallback will report nothing");
    } else {
        tracing::info!("Network map: {} configured nodes", static_map.len());
    }
    let netmap = Arc::new(CachedNetworkMap::new(
        static_map,
        daemon_config.netmap_cache_size,
    ));

    let shared_state = DaemonSharedState::new(local_key, netmap);

    let mut sinks: Vec<Arc<dyn Target>> = vec![Arc::new(LogTarget)];
    if !daemon_config.aggregator_urls.is_empty() {
        tracing::info!(
            "Aggregator reporting enabled: {} endpoints configured",
            daemon_config.aggregator_urls.len()
        );
        sinks.push(Arc::new(HttpAggregatorTarget::new(
            local_key,
            daemon_config.aggregator_urls.clone(),
        )));
    }
    let controller = Arc::new(shared_state.trust_controller(Arc::new(FanoutTarget::new(sinks))));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (event_tx, _) = broadcast::channel::<EpochEvent>(64);

    let pool = ReportPool::spawn(
        controller,
        daemon_config.report_workers,
        daemon_config.report_backlog,
    );

    let reporter = EpochReporter::new(event_tx.subscribe(), pool.handle(), shutdown_rx.clone());
    let reporter_task = tokio::spawn(reporter.run());

    let mut scheduler = EpochScheduler::new(
        Duration::from_secs(daemon_config.epoch_interval_secs.max(1)),
        0,
        event_tx,
        shutdown_rx,
    );
    let scheduler_task = tokio::spawn(async move {
        scheduler.run().await;
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_task.await {
        tracing::error!("Epoch scheduler error: {}", e);
    }
    if let Err(e) = reporter_task.await {
        tracing::error!("Epoch reporter error: {}", e);
    }
    pool.shutdown().await;

    tracing::info!(
        "Tessera daemon shut down gracefully after {:?}",
        shared_state.start_time.elapsed()
    );
    Ok(())
}
