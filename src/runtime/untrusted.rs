// src/runtime/untrusted.rs
//! Untrusted context bootstrap
//!
//! Installs the whole interception layer into a realm:
//! - flag table and deception registry for this context
//! - introspection hook, request wrappers and frame accessor hook
//! - the handshake initiator, started on demand

use crate::channel::bus::PublicBus;
use crate::channel::handshake::Initiator;
use crate::host::realm::Realm;
use crate::interception::deception::DeceptionRegistry;
use crate::interception::flag_table::FlagTable;
use crate::interception::http_interceptor::InterceptContext;
use crate::interception::realm_guard::RealmGuard;
use crate::utils::config::{EngineConfig, HandshakeConfig};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Interception state of one untrusted context
pub struct Untrusted {
    realm: Arc<Realm>,
    table: Arc<FlagTable>,
    registry: Arc<DeceptionRegistry>,
    guard: Arc<RealmGuard>,
    handshake: HandshakeConfig,
}

impl Untrusted {
    /// Wrap `realm` and everything nested in it
    pub fn install(realm: Arc<Realm>, config: &EngineConfig) -> Self {
        let table = FlagTable::new();
        let registry = DeceptionRegistry::new();
        let context = InterceptContext::new(&config.interception, Arc::clone(&table));
        let guard = RealmGuard::new(Arc::clone(&registry), context);
        guard.protect(&realm);

        info!(
            "interception installed in {:?}, watching {}",
            realm.id(),
            config.interception.watched_path
        );

        Self {
            realm,
            table,
            registry,
            guard,
            handshake: config.handshake.clone(),
        }
    }

    /// Start the disguised handoff in the background
    pub fn spawn_handshake(&self, bus: &PublicBus) -> JoinHandle<bool> {
        Initiator::new(self.handshake.clone(), Arc::clone(&self.table)).spawn(bus.clone())
    }

    pub fn realm(&self) -> &Arc<Realm> {
        &self.realm
    }

    pub fn table(&self) -> &Arc<FlagTable> {
        &self.table
    }

    pub fn registry(&self) -> &Arc<DeceptionRegistry> {
        &self.registry
    }

    pub fn guard(&self) -> &Arc<RealmGuard> {
        &self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::{StaticFetch, StaticXhr};

    #[test]
    fn test_install_wraps_every_primitive() {
        let realm = Realm::new(Arc::new(StaticFetch::new()), Arc::new(StaticXhr::new()));
        let untrusted = Untrusted::install(Arc::clone(&realm), &EngineConfig::default());

        assert!(untrusted.guard().is_protected(realm.id()));
        assert!(!realm.fetch().meta().is_native());
        assert!(!realm.xhr().meta().is_native());
        assert!(!realm.stringify_primitive().meta().is_native());
        assert!(!realm.frame_accessor().meta().is_native());
        // toString hook, fetch, send, frame accessor
        assert_eq!(untrusted.registry().len(), 4);
    }
}
