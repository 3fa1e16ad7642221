//! Quick test lifecycle daemon.
//!
//! Opens the record store, brings its schema up to date and runs the expiry
//! sweep, the statistics monitor and the Prometheus exporter until Ctrl+C or
//! SIGTERM.

mod config;

use anyhow::Context;
use config::Config;
use quicktest_core::{QuickTestService, SystemClock};
use quicktest_runtime::{MetricsServer, StatsMonitor, Sweeper};
use quicktest_sqlite::{Database, SqliteQuickTestService};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.telemetry.log_filter)
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        database = %config.store.location,
        validity_secs = config.lifecycle.validity.as_secs(),
        sweep_interval_secs = config.lifecycle.sweep_interval.as_secs(),
        "Starting quick test daemon"
    );

    let _metrics = match config.telemetry.metrics_addr {
        Some(addr) => {
            let mut server = MetricsServer::new(addr);
            server.start().context("failed to start metrics server")?;
            Some(server)
        },
        None => {
            info!("Metrics exporter disabled");
            None
        },
    };

    let db = Database::connect(&config.store, Arc::new(SystemClock))
        .await
        .context("failed to open quick test store")?;

    let service: Arc<dyn QuickTestService> = Arc::new(SqliteQuickTestService::new(db.clone()));

    let (sweeper, stop_sweeper) = Sweeper::new(
        Arc::clone(&service),
        config.lifecycle.validity,
        config.lifecycle.sweep_interval,
    );
    let (monitor, stop_monitor) = StatsMonitor::new(db.clone(), config.lifecycle.stats_interval);

    let sweeper_task = tokio::spawn(sweeper.run());
    let monitor_task = tokio::spawn(monitor.run());

    shutdown_signal().await;

    stop_sweeper.send(true).ok();
    stop_monitor.send(true).ok();

    let (sweeper_result, monitor_result) = tokio::join!(sweeper_task, monitor_task);
    sweeper_result.context("sweeper task panicked")?;
    monitor_result.context("statistics monitor task panicked")?;

    db.close().await;
    info!("Quick test daemon stopped");
    Ok(())
}

/// Graceful shutdown signal handler.
///
/// Waits for:
/// - Ctrl+C (SIGINT)
/// - SIGTERM (in production environments)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
