//! scorerd - telemetry-driven socket scoring service
//!
//! Loads the cluster topology, serves socket scores to the scheduler and
//! applies placement feedback to the telemetry cache.

use anyhow::{Context, Result};
use scorer_lib::{
    InMemoryTelemetryStore, PriorityAdapter, ProfileCatalog, ScorerMetrics, SocketSelector,
    StructuredLogger, TelemetryCache, TelemetryStore, Topology,
};
use scorerd::{api, config::ScorerConfig};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SCORER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting scorerd");

    let config = ScorerConfig::load()?;
    info!(
        instance = %config.instance,
        topology = %config.topology_path.display(),
        strategy = %config.scoring.strategy,
        "Scorer configured"
    );

    let health_registry =
        api::tracked_health_registry(config.scoring.health_failure_threshold).await;

    let topology = Arc::new(
        Topology::load(&config.topology_path)
            .with_context(|| format!("Failed to load topology {}", config.topology_path.display()))?,
    );

    let profiles = match &config.profiles_path {
        Some(path) => ProfileCatalog::with_overrides(path)?,
        None => ProfileCatalog::builtin(),
    };

    let store: Arc<dyn TelemetryStore> = match &config.telemetry.snapshot_path {
        Some(path) => Arc::new(InMemoryTelemetryStore::from_snapshot_file(path).await?),
        None => {
            warn!("No telemetry snapshot configured, every socket will score as ineligible until data arrives");
            Arc::new(InMemoryTelemetryStore::new())
        }
    };

    let socket_keys = topology.socket_keys();
    let socket_count = socket_keys.len();
    let cache = Arc::new(TelemetryCache::new(config.cache_ttl(), socket_keys));

    let metrics = ScorerMetrics::new();
    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(SCORER_VERSION, topology.node_count(), socket_count);

    let selector = Arc::new(
        SocketSelector::new(topology, cache.clone(), store, config.selector_config()?)
            .with_health(health_registry.clone()),
    );
    let adapter = Arc::new(PriorityAdapter::new(
        selector,
        Arc::new(profiles),
        logger.clone(),
    ));

    let (shutdown_tx, _) = broadcast::channel(1);
    let sweeper = tokio::spawn(cache.run_sweeper(metrics, shutdown_tx.subscribe()));

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), adapter));
    health_registry.set_ready(true).await;

    let mut api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
        served = &mut api_handle => {
            match served {
                Ok(Ok(())) => logger.log_shutdown("API server stopped"),
                Ok(Err(err)) => error!(error = %err, "API server failed"),
                Err(err) => error!(error = %err, "API server task failed"),
            }
        }
    }

    health_registry.set_ready(false).await;
    let _ = shutdown_tx.send(());
    sweeper.await?;
    api_handle.abort();
    info!("Shutting down");

    Ok(())
}
