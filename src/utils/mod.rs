// src/utils/mod.rs
//! Shared configuration and error types

pub mod config;
pub mod errors;

pub use config::{CoordinatorConfig, EngineConfig, HandshakeConfig, InterceptionConfig, StoreConfig};
pub use errors::{EngineError, Result};

/// Normalize an identity key into a handle: trimmed, lowercased
pub fn normalize_handle(raw: &str) -> String {
    raw.trim().to_lowercase()
}
