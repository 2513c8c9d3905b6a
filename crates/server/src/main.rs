mod bootstrap;
mod health;
mod sweeper;

use std::time::Duration;

use anyhow::Result;
use staffbridge_core::config::{AppConfig, LoadOptions};
use tokio::sync::watch;

use crate::sweeper::ExpirySweeper;

fn init_logging(config: &AppConfig) {
    use staffbridge_core::config::LogFormat::*;
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
    // Logging has to be up before bootstrap so its events are visible.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config);

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.store.clone(),
    )
    .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = ExpirySweeper::new(
        app.store.clone(),
        app.audit.clone(),
        Duration::from_secs(app.config.verification.cleanup_interval_secs),
    )
    .start(shutdown_rx);

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "staffbridge-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "staffbridge-server stopping"
    );

    let _ = shutdown_tx.send(true);
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, sweeper).await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => tracing::warn!(
            event_name = "system.server.sweeper_failed",
            correlation_id = "shutdown",
            error = %error,
            "expiry sweeper ended abnormally"
        ),
        Err(_) => tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "expiry sweeper did not stop within the grace period"
        ),
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}
