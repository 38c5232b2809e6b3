// src/coordinator/store.rs
//! Persistent flag store
//!
//! One versioned key in a SQLite key/value table holds the whole
//! handle -> `{location, flag}` map as JSON. The coordinator loads it once at
//! startup and rewrites it wholesale after every new resolution.

use crate::utils::config::StoreConfig;
use crate::utils::errors::{EngineError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One resolved handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFlag {
    pub location: Option<String>,
    pub flag: String,
    /// Unix seconds; absent in entries written before freshness tracking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<i64>,
}

impl StoredFlag {
    pub fn new(location: Option<String>, flag: impl Into<String>) -> Self {
        Self {
            location,
            flag: flag.into(),
            resolved_at: Some(chrono::Utc::now().timestamp()),
        }
    }
}

/// Handle -> stored flag, ordered so the persisted JSON is stable
pub type FlagMap = BTreeMap<String, StoredFlag>;

/// SQLite-backed store
pub struct FlagStore {
    db: Arc<Mutex<Connection>>,
    key: String,
    max_age_secs: Option<u64>,
}

impl FlagStore {
    /// Open (or create) the database at `config.db_path`
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        // Create parent directory
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    EngineError::StorageFailed(format!("Failed to create directory: {}", e))
                })?;
            }
        }
        // Open SQLite database
        let conn = Connection::open(&config.db_path).map_err(|e| {
            EngineError::StorageFailed(format!("Failed to open database: {}", e))
        })?;
        let store = Self::with_connection(conn, config);

        // Initialize schema
        store.init_schema().await?;
        info!("flag store opened at {:?}", config.db_path);
        Ok(store)
    }

    /// Private in-memory database
    pub async fn in_memory(config: &StoreConfig) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            EngineError::StorageFailed(format!("Failed to open database: {}", e))
        })?;
        let store = Self::with_connection(conn, config);
        store.init_schema().await?;
        Ok(store)
    }

    fn with_connection(conn: Connection, config: &StoreConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            key: config.store_key.clone(),
            max_age_secs: config.max_age_secs,
        }
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| EngineError::StorageFailed(format!("Schema creation failed: {}", e)))?;
        Ok(())
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the whole map, dropping entries older than the configured age
    pub async fn load(&self) -> Result<FlagMap> {
        let stored: Option<Value> = {
            let db = self.db.lock().await;
            db.query_row(
                "SELECT value FROM kv WHERE key = ?",
                params![self.key],
                |row| row.get(0),
            )
            .optional()?
        };

        // Nothing persisted yet
        let Some(value) = stored else {
            debug!("no stored flags under {}", self.key);
            return Ok(FlagMap::new());
        };

        let mut map: FlagMap = match serde_json::from_value(value) {
            Ok(map) => map,
            Err(e) => {
                warn!("stored flags under {} are unreadable, starting empty: {}", self.key, e);
                return Ok(FlagMap::new());
            }
        };

        // Drop stale entries
        if let Some(max_age) = self.max_age_secs {
            let cutoff = chrono::Utc::now().timestamp() - max_age as i64;
            let before = map.len();
            map.retain(|_, entry| entry.resolved_at.map_or(true, |at| at >= cutoff));
            if map.len() < before {
                debug!("dropped {} stale flags", before - map.len());
            }
        }

        info!("loaded {} stored flags", map.len());
        Ok(map)
    }

    /// Replace the whole map
    pub async fn replace(&self, map: &FlagMap) -> Result<()> {
        let value = serde_json::to_value(map)?;
        let db = self.db.lock().await;
        db.execute(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![self.key, value, chrono::Utc::now().timestamp()],
        )
        .map_err(|e| EngineError::StorageFailed(format!("Failed to write flags: {}", e)))?;
        debug!("persisted {} flags", map.len());
        Ok(())
    }
}

impl std::fmt::Debug for FlagStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlagStore").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> StoreConfig {
        StoreConfig {
            db_path: dir.path().join("flags.db"),
            ..StoreConfig::default()
        }
    }

    #[tokio::test]
    async fn test_round_trip_on_disk() {
        let dir = TempDir::new().unwrap();
        let mut map = FlagMap::new();
        map.insert("alice".into(), StoredFlag::new(Some("Berlin, Germany".into()), "🇩🇪"));
        map.insert("kenji".into(), StoredFlag::new(Some("JP".into()), "🇯🇵"));

        {
            let store = FlagStore::open(&config(&dir)).await.unwrap();
            store.replace(&map).await.unwrap();
        }

        let reopened = FlagStore::open(&config(&dir)).await.unwrap();
        assert_eq!(reopened.load().await.unwrap(), map);
    }

    #[tokio::test]
    async fn test_empty_store_loads_empty() {
        let store = FlagStore::in_memory(&StoreConfig::default()).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_overwrites() {
        let store = FlagStore::in_memory(&StoreConfig::default()).await.unwrap();
        let mut map = FlagMap::new();
        map.insert("a".into(), StoredFlag::new(None, "🏳️"));
        store.replace(&map).await.unwrap();
        map.insert("b".into(), StoredFlag::new(Some("Europe".into()), "🇪🇺"));
        store.replace(&map).await.unwrap();
        assert_eq!(store.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_entries_dropped_at_load() {
        let config = StoreConfig {
            max_age_secs: Some(3600),
            ..StoreConfig::default()
        };
        let store = FlagStore::in_memory(&config).await.unwrap();

        let mut map = FlagMap::new();
        map.insert("fresh".into(), StoredFlag::new(None, "🇫🇷"));
        map.insert(
            "stale".into(),
            StoredFlag {
                location: None,
                flag: "🇫🇷".into(),
                resolved_at: Some(chrono::Utc::now().timestamp() - 7200),
            },
        );
        map.insert(
            "legacy".into(),
            StoredFlag {
                location: None,
                flag: "🇫🇷".into(),
                resolved_at: None,
            },
        );
        store.replace(&map).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert!(loaded.contains_key("fresh"));
        assert!(loaded.contains_key("legacy"));
        assert!(!loaded.contains_key("stale"));
    }

    #[tokio::test]
    async fn test_unreadable_payload_starts_empty() {
        let store = FlagStore::in_memory(&StoreConfig::default()).await.unwrap();
        {
            let db = store.db.lock().await;
            db.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, 0)",
                params![store.key, "[1,2,3]"],
            )
            .unwrap();
        }
        assert!(store.load().await.unwrap().is_empty());
    }
}
