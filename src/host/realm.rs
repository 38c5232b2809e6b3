// src/host/realm.rs
//! Execution contexts
//!
//! A [`Realm`] owns its own copy of every primitive. Host code always goes
//! through the current slot, so replacing a slot changes what host code
//! calls. Nested realms (frames) are only reachable through the realm's
//! frame accessor.

use crate::host::callable::HostCallable;
use crate::host::primitives::{
    CallbackPrimitive, FetchPrimitive, FrameAccessor, NativeFrameAccessor, NativeStringify,
    StringifyPrimitive,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Process-unique realm identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RealmId(u64);

impl RealmId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle of a nested realm inside its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(u64);

/// One execution context
pub struct Realm {
    id: RealmId,
    fetch: RwLock<Arc<dyn FetchPrimitive>>,
    xhr: RwLock<Arc<dyn CallbackPrimitive>>,
    stringify: RwLock<Arc<dyn StringifyPrimitive>>,
    frame_accessor: RwLock<Arc<dyn FrameAccessor>>,
    frames: RwLock<HashMap<FrameId, Arc<Realm>>>,
    next_frame: AtomicU64,
}

impl Realm {
    /// Create a realm with the given request primitives and native introspection
    pub fn new(fetch: Arc<dyn FetchPrimitive>, xhr: Arc<dyn CallbackPrimitive>) -> Arc<Self> {
        Arc::new(Self {
            id: RealmId::next(),
            fetch: RwLock::new(fetch),
            xhr: RwLock::new(xhr),
            stringify: RwLock::new(Arc::new(NativeStringify::new())),
            frame_accessor: RwLock::new(Arc::new(NativeFrameAccessor::new())),
            frames: RwLock::new(HashMap::new()),
            next_frame: AtomicU64::new(1),
        })
    }

    pub fn id(&self) -> RealmId {
        self.id
    }

    pub fn fetch(&self) -> Arc<dyn FetchPrimitive> {
        self.fetch.read().clone()
    }

    pub fn set_fetch(&self, fetch: Arc<dyn FetchPrimitive>) {
        *self.fetch.write() = fetch;
    }

    pub fn xhr(&self) -> Arc<dyn CallbackPrimitive> {
        self.xhr.read().clone()
    }

    pub fn set_xhr(&self, xhr: Arc<dyn CallbackPrimitive>) {
        *self.xhr.write() = xhr;
    }

    pub fn stringify_primitive(&self) -> Arc<dyn StringifyPrimitive> {
        self.stringify.read().clone()
    }

    pub fn set_stringify(&self, stringify: Arc<dyn StringifyPrimitive>) {
        *self.stringify.write() = stringify;
    }

    pub fn frame_accessor(&self) -> Arc<dyn FrameAccessor> {
        self.frame_accessor.read().clone()
    }

    pub fn set_frame_accessor(&self, accessor: Arc<dyn FrameAccessor>) {
        *self.frame_accessor.write() = accessor;
    }

    /// Stringify a callable the way host code would
    pub fn describe<C: HostCallable + ?Sized>(&self, subject: &C) -> String {
        self.stringify_primitive().stringify(subject.meta())
    }

    /// Embed a nested realm
    pub fn attach_frame(&self, child: Arc<Realm>) -> FrameId {
        let frame = FrameId(self.next_frame.fetch_add(1, Ordering::Relaxed));
        self.frames.write().insert(frame, child);
        frame
    }

    pub fn detach_frame(&self, frame: FrameId) -> Option<Arc<Realm>> {
        self.frames.write().remove(&frame)
    }

    /// Read a nested realm through the current accessor
    pub fn frame_content(&self, frame: FrameId) -> Option<Arc<Realm>> {
        let accessor = self.frame_accessor();
        accessor.content(self, frame)
    }

    /// Direct frame lookup, bypassing the accessor slot
    pub(crate) fn raw_frame(&self, frame: FrameId) -> Option<Arc<Realm>> {
        self.frames.read().get(&frame).cloned()
    }
}

impl std::fmt::Debug for Realm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Realm")
            .field("id", &self.id)
            .field("frames", &self.frames.read().len())
            .finish()
    }
}
