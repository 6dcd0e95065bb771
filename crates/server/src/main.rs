mod bitrix;
mod bootstrap;
mod health;
mod telegram_api;

use std::time::Duration;

use anyhow::Result;
use courierbot_core::config::{AppConfig, LoadOptions};
use tracing::{info, warn};

fn init_logging(config: &AppConfig) {
    use courierbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    info!(event_name = "system.server.started", "courierbot-server started");

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let shutdown_handle = app.runner.shutdown_handle();
    let wait_for_signal = async move {
        let outcome = tokio::signal::ctrl_c().await;
        info!(event_name = "system.server.stopping", "shutdown signal received, draining");
        shutdown_handle.shutdown();
        // Let the in-flight message finish; past the grace window we stop
        // waiting and exit anyway.
        tokio::time::sleep(grace).await;
        outcome
    };

    tokio::select! {
        result = app.runner.start() => result?,
        signal = wait_for_signal => {
            signal?;
            warn!("grace window elapsed before the runner drained, exiting");
        }
    }

    info!(event_name = "system.server.stopped", "courierbot-server stopped");
    Ok(())
}
