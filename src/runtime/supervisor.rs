// src/runtime/supervisor.rs
//! Trusted context bootstrap
//!
//! Loads the persistent store, builds the lookup coordinator and listens for
//! handoffs on the public bus. The responder task stops when the supervisor
//! is dropped.

use crate::channel::bus::PublicBus;
use crate::channel::handshake::Responder;
use crate::coordinator::batcher::LookupCoordinator;
use crate::coordinator::lookup::{HttpLookup, LookupService};
use crate::coordinator::store::FlagStore;
use crate::utils::config::EngineConfig;
use crate::utils::errors::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Trusted supervisor
pub struct Supervisor {
    coordinator: Arc<LookupCoordinator>,
    responder: JoinHandle<()>,
}

impl Supervisor {
    /// Start with an explicit lookup service and store
    pub async fn start(
        config: &EngineConfig,
        lookup: Arc<dyn LookupService>,
        store: FlagStore,
        bus: &PublicBus,
    ) -> Result<Self> {
        // Load the persisted cache into a fresh coordinator
        let coordinator =
            LookupCoordinator::new(config.coordinator.clone(), lookup, store).await?;

        // Answer handoffs on the public bus
        let responder = Responder::new(Arc::clone(&coordinator)).spawn(bus);
        info!("supervisor listening for handoffs");

        Ok(Self {
            coordinator,
            responder,
        })
    }

    /// Start against the configured lookup service and on-disk store
    pub async fn from_config(config: &EngineConfig, bus: &PublicBus) -> Result<Self> {
        config.validate()?;

        // Create lookup client
        let lookup = Arc::new(HttpLookup::new(&config.coordinator)?);

        // Open flag store
        let store = FlagStore::open(&config.storage).await?;
        Self::start(config, lookup, store, bus).await
    }

    pub fn coordinator(&self) -> &Arc<LookupCoordinator> {
        &self.coordinator
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.responder.abort();
    }
}
