// src/utils/errors.rs
//! Engine error taxonomy
//!
//! Every fallible internal operation returns [`Result`]. Errors never cross
//! into host code: the boundaries in `interception` convert them into
//! pass-through behavior.

use thiserror::Error;

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Lookup service unreachable, timed out, or answered with a non-success status
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// Body is not valid structured data
    #[error("Parse failure: {0}")]
    ParseFailure(String),

    /// No private channel has been established yet
    #[error("Channel unavailable")]
    ChannelUnavailable,

    /// Introspection subject is not a registered wrapper
    #[error("Reflection target missing: {0}")]
    ReflectionTargetMissing(String),

    /// No listener claimed the handoff
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Storage failed: {0}")]
    StorageFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Failures the coordinator answers with a retry instead of a resolution
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::NetworkFailure(_) | EngineError::ParseFailure(_)
        )
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::StorageFailed(e.to_string())
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(e: config::ConfigError) -> Self {
        EngineError::ConfigError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(EngineError::NetworkFailure("500".into()).is_retryable());
        assert!(EngineError::ParseFailure("eof".into()).is_retryable());
        assert!(!EngineError::ChannelUnavailable.is_retryable());
        assert!(!EngineError::StorageFailed("locked".into()).is_retryable());
    }

    #[test]
    fn test_serde_conversion() {
        let err: EngineError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, EngineError::Serialization(_)));
    }
}
