// src/lib.rs
//! Plox Engine Library
//!
//! Appends a location flag to identity labels of a single-page application by
//! patching its own API responses as they are consumed, and resolves the
//! locations in a separate trusted context.
//!
//! # Architecture
//!
//! The engine is structured into several key modules:
//!
//! - **host**: model of the host application's realms and primitives
//! - **interception**: request wrappers, deep scan, deception registry, realm propagation
//! - **channel**: disguised handoff and the private duplex channel
//! - **coordinator**: dedup, batching, lookup, flag resolution and persistence
//! - **runtime**: bootstrap of the untrusted and trusted contexts
//! - **observability**: tracing and metrics
//! - **utils**: configuration, errors and helpers

// Public module exports
pub mod channel;
pub mod coordinator;
pub mod host;
pub mod interception;
pub mod observability;
pub mod runtime;
pub mod utils;

// Re-export commonly used types
pub use channel::{PublicBus, WireMessage};
pub use coordinator::{resolve_flag, FlagStore, HttpLookup, LookupCoordinator, LookupService};
pub use host::Realm;
pub use runtime::{Supervisor, Untrusted};
pub use utils::config::EngineConfig;
pub use utils::errors::{EngineError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
