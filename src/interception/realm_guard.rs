// src/interception/realm_guard.rs
//! Nested realm propagation
//!
//! Nested realms come with their own primitives. The guard hooks the frame
//! accessor of every realm it protects; each time host code reads a nested
//! realm through it, the nested realm is protected too before it is handed
//! back. Protection is tracked by realm identity, so it happens once.

use crate::host::callable::{CallableMeta, HostCallable};
use crate::host::primitives::FrameAccessor;
use crate::host::realm::{FrameId, Realm, RealmId};
use crate::interception::deception::DeceptionRegistry;
use crate::interception::http_interceptor::{install_request_wrappers, InterceptContext};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

const ACCESSOR_SOURCE: &str = "function get contentWindow() { return protect(target.call(this)) }";

/// Applies the interception layer to every realm it is shown
pub struct RealmGuard {
    registry: Arc<DeceptionRegistry>,
    context: Arc<InterceptContext>,
    protected: Mutex<HashSet<RealmId>>,
}

impl RealmGuard {
    pub fn new(registry: Arc<DeceptionRegistry>, context: Arc<InterceptContext>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            context,
            protected: Mutex::new(HashSet::new()),
        })
    }

    /// Wrap a realm's primitives; `false` if it was already protected
    pub fn protect(self: &Arc<Self>, realm: &Realm) -> bool {
        if !self.protected.lock().insert(realm.id()) {
            return false;
        }

        // Hook first so every lie below is computed against native output
        self.registry.install_hook(realm);
        install_request_wrappers(realm, &self.registry, &self.context);

        let accessor = realm.frame_accessor();
        let meta = self
            .registry
            .disguise(accessor.meta(), &*realm.stringify_primitive(), ACCESSOR_SOURCE);
        realm.set_frame_accessor(Arc::new(GuardedFrameAccessor {
            meta,
            target: accessor,
            guard: Arc::clone(self),
        }));

        info!("realm {:?} protected", realm.id());
        true
    }

    /// Observer entry point for a newly exposed realm
    pub fn on_realm_exposed(self: &Arc<Self>, realm: &Realm) {
        self.protect(realm);
    }

    pub fn is_protected(&self, id: RealmId) -> bool {
        self.protected.lock().contains(&id)
    }

    pub fn protected_count(&self) -> usize {
        self.protected.lock().len()
    }
}

/// Frame accessor that protects nested realms on the way out
struct GuardedFrameAccessor {
    meta: CallableMeta,
    target: Arc<dyn FrameAccessor>,
    guard: Arc<RealmGuard>,
}

impl HostCallable for GuardedFrameAccessor {
    fn meta(&self) -> &CallableMeta {
        &self.meta
    }
}

impl FrameAccessor for GuardedFrameAccessor {
    fn content(&self, owner: &Realm, frame: FrameId) -> Option<Arc<Realm>> {
        let nested = self.target.content(owner, frame)?;
        self.guard.on_realm_exposed(&nested);
        Some(nested)
    }
}
