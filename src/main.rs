// src/main.rs
//! Plox supervisor
//!
//! Runs the trusted side on its own: loads configuration, opens the flag
//! store and answers handoffs on a local bus until interrupted.

use plox_engine::observability::{init_metrics, init_tracing};
use plox_engine::utils::config::EngineConfig;
use plox_engine::{PublicBus, Result, Supervisor};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let metrics = init_metrics()?;

    info!("Starting Plox supervisor v{}", plox_engine::VERSION);

    let config = EngineConfig::load()?;
    info!("Configuration loaded: {:?}", config);

    let bus = PublicBus::default();
    let supervisor = Supervisor::from_config(&config, &bus).await?;
    info!(
        "{} resolved handles loaded from {}",
        supervisor.coordinator().cache_len(),
        config.storage.db_path.display()
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Received shutdown signal, cleaning up...");

    drop(supervisor);
    info!("Final metrics:\n{}", metrics.render());
    Ok(())
}
