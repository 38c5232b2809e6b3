// src/interception/deception.rs
//! Presented-identity registry
//!
//! Wrappers are built through [`DeceptionRegistry::disguise`], which copies
//! the original's name, arity and prototype link and records what the
//! original stringifies to before the wrapper exists. The realm's stringify
//! primitive is replaced once by an [`IntrospectionHook`] that answers with
//! the recorded string for registered wrappers and defers to the native
//! primitive for everything else.

use crate::host::callable::{CallableId, CallableMeta, CallableSource, HostCallable};
use crate::host::primitives::StringifyPrimitive;
use crate::host::realm::{Realm, RealmId};
use crate::utils::errors::{EngineError, Result};
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tracing::{debug, trace};

const HOOK_SOURCE: &str = "function toString() { return lies.get(this) ?? native.call(this) }";

/// Wrapper identity -> string its original reports under introspection
#[derive(Debug, Default)]
pub struct DeceptionRegistry {
    lies: DashMap<CallableId, String>,
    hooked: DashSet<RealmId>,
}

impl DeceptionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Build the metadata of a wrapper around `original` and register its lie
    pub fn disguise(
        &self,
        original: &CallableMeta,
        native: &dyn StringifyPrimitive,
        wrapper_source: &str,
    ) -> CallableMeta {
        let meta = CallableMeta {
            id: CallableId::next(),
            name: original.name.clone(),
            arity: original.arity,
            prototype: original.prototype,
            source: CallableSource::Script(wrapper_source.to_string()),
        };
        let lie = native.stringify(original);
        trace!("registered lie for {} ({:?})", meta.name, meta.id);
        self.lies.insert(meta.id, lie);
        meta
    }

    pub fn lie_for(&self, id: CallableId) -> Result<String> {
        self.lies
            .get(&id)
            .map(|lie| lie.value().clone())
            .ok_or_else(|| EngineError::ReflectionTargetMissing(format!("{:?}", id)))
    }

    pub fn is_registered(&self, id: CallableId) -> bool {
        self.lies.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lies.is_empty()
    }

    /// Replace the realm's stringify primitive; no-op if already done
    pub fn install_hook(self: &Arc<Self>, realm: &Realm) -> bool {
        if !self.hooked.insert(realm.id()) {
            return false;
        }
        let native = realm.stringify_primitive();
        let meta = self.disguise(native.meta(), &*native, HOOK_SOURCE);
        realm.set_stringify(Arc::new(IntrospectionHook {
            meta,
            native,
            registry: Arc::clone(self),
        }));
        debug!("introspection hook installed in {:?}", realm.id());
        true
    }
}

/// Stringify primitive consulting the registry first
pub struct IntrospectionHook {
    meta: CallableMeta,
    native: Arc<dyn StringifyPrimitive>,
    registry: Arc<DeceptionRegistry>,
}

impl HostCallable for IntrospectionHook {
    fn meta(&self) -> &CallableMeta {
        &self.meta
    }
}

impl StringifyPrimitive for IntrospectionHook {
    fn stringify(&self, subject: &CallableMeta) -> String {
        match self.registry.lie_for(subject.id) {
            Ok(lie) => lie,
            Err(_) => self.native.stringify(subject),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::{StaticFetch, StaticXhr};
    use crate::host::primitives::NativeStringify;

    fn realm() -> Arc<Realm> {
        Realm::new(Arc::new(StaticFetch::new()), Arc::new(StaticXhr::new()))
    }

    #[test]
    fn test_disguise_copies_metadata() {
        let registry = DeceptionRegistry::new();
        let original = CallableMeta::native("fetch", 1);
        let wrapper = registry.disguise(&original, &NativeStringify::new(), "() => 1");

        assert_ne!(wrapper.id, original.id);
        assert_eq!(wrapper.name, "fetch");
        assert_eq!(wrapper.arity, 1);
        assert_eq!(wrapper.prototype, original.prototype);
        assert_eq!(
            registry.lie_for(wrapper.id).unwrap(),
            "function fetch() { [native code] }"
        );
    }

    #[test]
    fn test_hook_lies_for_wrappers_only() {
        let registry = DeceptionRegistry::new();
        let realm = realm();
        assert!(registry.install_hook(&realm));

        let original = CallableMeta::native("open", 2);
        let wrapper = registry.disguise(&original, &NativeStringify::new(), "function open() { hooked() }");
        let stranger = CallableMeta::script("helper", 0, "function helper() {}");

        let stringify = realm.stringify_primitive();
        assert_eq!(stringify.stringify(&wrapper), "function open() { [native code] }");
        assert_eq!(stringify.stringify(&stranger), "function helper() {}");
    }

    #[test]
    fn test_hook_hides_itself() {
        let registry = DeceptionRegistry::new();
        let realm = realm();
        registry.install_hook(&realm);

        let hook = realm.stringify_primitive();
        assert_eq!(realm.describe(&*hook), "function toString() { [native code] }");
        assert_eq!(hook.meta().name, "toString");
    }

    #[test]
    fn test_hook_installed_once() {
        let registry = DeceptionRegistry::new();
        let realm = realm();
        assert!(registry.install_hook(&realm));
        let first = realm.stringify_primitive().meta().id;
        assert!(!registry.install_hook(&realm));
        assert_eq!(realm.stringify_primitive().meta().id, first);
    }

    #[test]
    fn test_missing_target_reported() {
        let registry = DeceptionRegistry::new();
        let err = registry.lie_for(CallableId::next()).unwrap_err();
        assert!(matches!(err, EngineError::ReflectionTargetMissing(_)));
    }
}
