//! Strategy control plane entry point
//!
//! 1. Loads `.env` and the YAML configuration
//! 2. Starts the controller (command subscription + periodic publishes)
//! 3. Serves the frontend WebSocket bridge
//! 4. Shuts everything down on Ctrl+C

use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use strategy_ctl::config::{self, constants, logging};
use strategy_ctl::core::{CommandChannel, PeriodicScheduler, StrategyController};
use strategy_ctl::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenvy::dotenv().ok();

    logging::init_logging();

    info!("🚀 Strategy control plane starting...");

    let config = match config::load_default_config() {
        Ok((path, cfg)) => {
            info!(
                path = %path.display(),
                status_keys = cfg.status.len(),
                params = cfg.params.len(),
                "[CONFIG] Loaded"
            );
            cfg
        }
        Err(e) => {
            error!("[ERROR] Configuration failed: {}", e);
            std::process::exit(1);
        }
    };
    constants::log_configuration();

    let channel = CommandChannel::new(constants::command_channel_capacity());
    let controller = Arc::new(StrategyController::from_config(&config, channel.clone()));
    let handle = controller.start(PeriodicScheduler::new())?;

    let bridge = if config.server.enabled {
        let listener = server::bind(&config.server).await?;
        Some(tokio::spawn(server::serve(
            listener,
            channel.clone(),
            channel.shutdown_token(),
        )))
    } else {
        info!("WebSocket bridge disabled");
        None
    };

    info!("⏳ Running. Press Ctrl+C to stop.");
    match signal::ctrl_c().await {
        Ok(()) => info!("[SHUTDOWN] Graceful shutdown initiated"),
        Err(err) => error!("Failed to listen for Ctrl+C signal: {}", err),
    }

    handle.shutdown().await;

    // Cancels the bridge token as well, closing every client session
    channel.shutdown().await;
    if let Some(bridge) = bridge {
        if let Err(e) = bridge.await {
            error!(error = %e, "WebSocket bridge task failed");
        }
    }

    info!("[SHUTDOWN] Clean exit");
    Ok(())
}
