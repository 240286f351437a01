//! Main entry point for the paddock session-formation engine
//!
//! This is the production entry point that initializes and runs the
//! engine with proper error handling, logging, and graceful shutdown.

use anyhow::Result;
use clap::Parser;
use paddock::config::AppConfig;
use paddock::notify::LogNotifier;
use paddock::reference::StaticReferenceProvider;
use paddock::service::AppState;
use paddock::store::InMemoryQueueStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

/// Paddock Session-Formation Engine - race lobby matchmaking
#[derive(Parser)]
#[command(
    name = "paddock",
    version,
    about = "Session-formation engine for multiplayer race lobbies",
    long_about = "Paddock forms multiplayer race sessions: it runs matchmaking queues with \
                 car-class and ignore-list semantics, creates and fills lobbies with countdown \
                 scheduling, scans the instant queue in the background, and coordinates atomic \
                 Race Again successor lobbies."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🏁 Paddock Session-Formation Engine");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   Monitor interval: {}s",
        config.matchmaking.monitor_interval_seconds
    );
    info!(
        "   Instant queue max wait: {}s",
        config.matchmaking.instant_max_wait_seconds
    );
    info!(
        "   Auto-create delay: {}s",
        config.matchmaking.auto_create_delay_seconds
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    // Single-node wiring: in-memory queue store, static reference data,
    // notices delivered to the structured log
    let app_state = AppState::new(
        config,
        Arc::new(InMemoryQueueStore::new()),
        Arc::new(StaticReferenceProvider::new()),
        Arc::new(LogNotifier::new()),
    )?;
    let app_state = Arc::new(app_state);

    app_state.start().await?;
    info!("Paddock is running; press Ctrl+C to stop");

    wait_for_shutdown_signal().await;

    info!("Shutting down...");
    app_state.stop().await;
    info!("Shutdown complete");

    Ok(())
}
