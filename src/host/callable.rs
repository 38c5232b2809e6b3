// src/host/callable.rs
//! Callable identity and metadata
//!
//! Every primitive a realm exposes carries a [`CallableMeta`]. The metadata is
//! what host code can observe through reflection: a name, an arity, a
//! prototype link and whatever the stringify primitive reports.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of a callable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallableId(u64);

impl CallableId {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// What a callable's definition looks like to the stringify primitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallableSource {
    /// Built into the host
    Native,

    /// Defined by script; the text is its real definition
    Script(String),
}

/// Reflection-visible metadata of a callable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallableMeta {
    pub id: CallableId,
    pub name: String,
    pub arity: usize,
    pub prototype: Option<CallableId>,
    pub source: CallableSource,
}

impl CallableMeta {
    /// Metadata of a host-provided callable
    pub fn native(name: impl Into<String>, arity: usize) -> Self {
        Self {
            id: CallableId::next(),
            name: name.into(),
            arity,
            prototype: Some(function_prototype()),
            source: CallableSource::Native,
        }
    }

    /// Metadata of a script-defined callable
    pub fn script(name: impl Into<String>, arity: usize, text: impl Into<String>) -> Self {
        Self {
            id: CallableId::next(),
            name: name.into(),
            arity,
            prototype: Some(function_prototype()),
            source: CallableSource::Script(text.into()),
        }
    }

    /// True native stringification
    pub fn native_string(&self) -> String {
        match &self.source {
            CallableSource::Native => format!("function {}() {{ [native code] }}", self.name),
            CallableSource::Script(text) => text.clone(),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self.source, CallableSource::Native)
    }
}

/// Anything a realm exposes as a function
pub trait HostCallable: Send + Sync {
    fn meta(&self) -> &CallableMeta;
}

/// Identity shared by every callable's prototype link
pub fn function_prototype() -> CallableId {
    static PROTOTYPE: once_cell::sync::Lazy<CallableId> = once_cell::sync::Lazy::new(CallableId::next);
    *PROTOTYPE
}
