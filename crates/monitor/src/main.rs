//! Throughput monitor
//!
//! Polls per-target record counters and the producer status log, persists
//! samples, and fits time-per-unit cost models while serving a read-only
//! query API.

use anyhow::{Context, Result};
use monitor_lib::{
    api::{self, ApiState},
    health::{components, HealthRegistry},
    observability::{MonitorMetrics, StructuredLogger},
    FsObservationSource, JsonlStore, PollEngineBuilder,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting throughput-monitor");

    let config = config::MonitorConfig::load()?;
    let engine_config = config.engine_config();
    info!(
        node_name = %config.node_name,
        data_dir = %config.data_dir.display(),
        store_dir = %config.store_dir.display(),
        "Monitor configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::POLLER).await;
    health_registry.register(components::SOURCE).await;
    health_registry.register(components::STORE).await;

    let metrics = MonitorMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);

    let source = Arc::new(FsObservationSource::new(
        config.data_dir.clone(),
        engine_config.targets.clone(),
    ));
    let store = Arc::new(
        JsonlStore::open(config.store_dir.clone())
            .await
            .with_context(|| format!("Failed to open store at {}", config.store_dir.display()))?,
    );

    let engine = PollEngineBuilder::new()
        .source(source)
        .store(store.clone())
        .config(engine_config.clone())
        .metrics(metrics)
        .logger(logger.clone())
        .health(health_registry.clone())
        .build()
        .context("Invalid engine configuration")?;

    // An unreachable source at startup is fatal
    let ctx = engine
        .start()
        .await
        .context("Failed to reach the observation source")?;

    logger.log_startup(
        MONITOR_VERSION,
        &engine_config.targets,
        config.poll_seconds,
        &ctx.cursor.last_ts().to_rfc3339(),
    );

    let app_state = Arc::new(ApiState::new(
        health_registry.clone(),
        store,
        engine_config.targets.clone(),
    ));
    health_registry.set_ready(true).await;

    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state).await {
            error!(error = %e, "API server stopped");
        }
    });

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let engine_handle = tokio::spawn(engine.run(ctx, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    health_registry.set_ready(false).await;

    // The receiver only goes away if the loop already exited
    let _ = shutdown_tx.send(());
    let ctx = engine_handle.await.context("Polling loop panicked")?;
    info!(
        last_status_ts = %ctx.cursor.last_ts().to_rfc3339(),
        "Shutdown complete"
    );

    Ok(())
}
