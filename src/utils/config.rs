// src/utils/config.rs
//! Engine configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional file
//! (path in `PLOX_CONFIG`, default `plox`), then `PLOX__SECTION__KEY`
//! environment variables.

use crate::utils::errors::{EngineError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub interception: InterceptionConfig,
    pub handshake: HandshakeConfig,
    pub coordinator: CoordinatorConfig,
    pub storage: StoreConfig,
}

/// Untrusted-side scanning settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptionConfig {
    /// Request URLs containing this substring are scanned
    pub watched_path: String,

    /// Field holding the stable handle of an identity record
    pub id_key: String,

    /// Field holding the mutable display label
    pub display_key: String,

    /// Recursion cap for the deep scan
    pub max_depth: usize,

    /// Object fields the scan descends into (arrays are always descended)
    pub descend_keys: Vec<String>,
}

impl Default for InterceptionConfig {
    fn default() -> Self {
        Self {
            watched_path: "/i/api/graphql/".to_string(),
            id_key: "screen_name".to_string(),
            display_key: "name".to_string(),
            max_depth: 20,
            descend_keys: [
                "data",
                "user",
                "legacy",
                "user_results",
                "result",
                "core",
                "instructions",
                "entries",
                "content",
                "itemContent",
                "tweet_results",
                "globalObjects",
                "users",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
        }
    }
}

/// Handshake retry bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Broadcast attempts before giving up silently
    pub max_attempts: u32,

    /// Claim detection poll interval (milliseconds)
    pub poll_interval_ms: u64,

    /// Hard ceiling on claim detection per attempt (milliseconds)
    pub claim_timeout_ms: u64,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            poll_interval_ms: 50,
            claim_timeout_ms: 5_000,
        }
    }
}

impl HandshakeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn claim_timeout(&self) -> Duration {
        Duration::from_millis(self.claim_timeout_ms)
    }
}

/// Trusted-side lookup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Lookup service endpoint; the handle goes in the `username` query parameter
    pub lookup_url: String,

    pub batch_jitter_min_ms: u64,
    pub batch_jitter_max_ms: u64,

    /// Client-side timeout for one lookup call (milliseconds)
    pub request_timeout_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            lookup_url: "http://127.0.0.1:5000/met".to_string(),
            batch_jitter_min_ms: 50,
            batch_jitter_max_ms: 250,
            request_timeout_ms: 10_000,
        }
    }
}

impl CoordinatorConfig {
    pub fn jitter_window(&self) -> RangeInclusive<u64> {
        self.batch_jitter_min_ms..=self.batch_jitter_max_ms
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Persistent store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file
    pub db_path: PathBuf,

    /// Versioned key holding the whole handle map
    pub store_key: String,

    /// Entries older than this are dropped at load; `None` keeps everything
    pub max_age_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("plox.db"),
            store_key: "flag_cache:v1".to_string(),
            max_age_secs: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from defaults, file and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var("PLOX_CONFIG").unwrap_or_else(|_| "plox".to_string());
        Self::load_from(&path)
    }

    /// Load configuration with an explicit file stem or path
    pub fn load_from(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(Config::try_from(&EngineConfig::default())?)
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("PLOX")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("interception.descend_keys")
                    .try_parsing(true),
            )
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.interception.watched_path.is_empty() {
            return Err(EngineError::ConfigError(
                "interception.watched_path must not be empty".to_string(),
            ));
        }
        if self.interception.max_depth == 0 {
            return Err(EngineError::ConfigError(
                "interception.max_depth must be at least 1".to_string(),
            ));
        }
        if self.coordinator.batch_jitter_min_ms > self.coordinator.batch_jitter_max_ms {
            return Err(EngineError::ConfigError(format!(
                "batch jitter window is inverted: {}..{}",
                self.coordinator.batch_jitter_min_ms, self.coordinator.batch_jitter_max_ms
            )));
        }
        if self.handshake.max_attempts == 0 {
            return Err(EngineError::ConfigError(
                "handshake.max_attempts must be at least 1".to_string(),
            ));
        }
        url::Url::parse(&self.coordinator.lookup_url).map_err(|e| {
            EngineError::ConfigError(format!("invalid lookup_url: {}", e))
        })?;
        Ok(())
    }
}
