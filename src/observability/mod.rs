// src/observability/mod.rs
//! Tracing and metrics setup
//!
//! Log level comes from `PLOX_LOG` (falls back to `info`). Set
//! `PLOX_LOG_FORMAT=json` for structured output.

use crate::utils::errors::{EngineError, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOOKUPS_ISSUED: &str = "plox_lookups_issued_total";
pub const LOOKUPS_FAILED: &str = "plox_lookups_failed_total";
pub const CACHE_HITS: &str = "plox_cache_hits_total";
pub const DISCOVERIES_EMITTED: &str = "plox_discoveries_emitted_total";
pub const RESPONSES_PATCHED: &str = "plox_responses_patched_total";
pub const HANDSHAKES_COMPLETED: &str = "plox_handshakes_completed_total";

/// Install the global tracing subscriber
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_env("PLOX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("PLOX_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|e| EngineError::ConfigError(format!("tracing init failed: {}", e)))
}

/// Install the Prometheus recorder and return its render handle
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| EngineError::ConfigError(format!("metrics init failed: {}", e)))
}
