//! Persistence backends for the geolocation cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CapabilityError;

/// One cached lookup: when it was fetched (seconds since the epoch) and
/// the raw provider payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub ts: f64,
    pub data: Value,
}

/// Where cache entries live between restarts.
pub trait CacheStore: Send + Sync {
    fn load(&self) -> Result<HashMap<String, CacheEntry>, CapabilityError>;

    /// Persist a full snapshot of the cache.
    fn save(&self, entries: &HashMap<String, CacheEntry>) -> Result<(), CapabilityError>;
}

/// Keeps nothing; the cache lives only in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore;

impl CacheStore for MemoryStore {
    fn load(&self) -> Result<HashMap<String, CacheEntry>, CapabilityError> {
        Ok(HashMap::new())
    }

    fn save(&self, _entries: &HashMap<String, CacheEntry>) -> Result<(), CapabilityError> {
        Ok(())
    }
}

/// A JSON document mapping key to `{"ts": .., "data": ..}`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for JsonFileStore {
    fn load(&self) -> Result<HashMap<String, CacheEntry>, CapabilityError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| CapabilityError::Cache(format!("failed to read cache file: {}", e)))?;
        let raw: HashMap<String, Value> = serde_json::from_str(&content)
            .map_err(|e| CapabilityError::Cache(format!("malformed cache file: {}", e)))?;

        // Entries without a payload are skipped rather than failing the load.
        Ok(raw
            .into_iter()
            .filter_map(|(key, value)| {
                serde_json::from_value::<CacheEntry>(value)
                    .ok()
                    .filter(|entry| !entry.data.is_null())
                    .map(|entry| (key, entry))
            })
            .collect())
    }

    fn save(&self, entries: &HashMap<String, CacheEntry>) -> Result<(), CapabilityError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CapabilityError::Cache(format!("failed to create cache dir: {}", e)))?;
        }
        let content = serde_json::to_string(entries)
            .map_err(|e| CapabilityError::Cache(e.to_string()))?;
        std::fs::write(&self.path, content)
            .map_err(|e| CapabilityError::Cache(format!("failed to write cache file: {}", e)))
    }
}

/// A single-table SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: &Path) -> Result<Self, CapabilityError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CapabilityError::Cache(format!("failed to create cache dir: {}", e)))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        Self::init(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, CapabilityError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CapabilityError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS geoip_cache (
                key  TEXT PRIMARY KEY,
                ts   REAL NOT NULL,
                data TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, CapabilityError>
    where
        F: FnOnce(&mut Connection) -> Result<T, CapabilityError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| CapabilityError::Cache(format!("cache lock poisoned: {}", e)))?;
        f(&mut conn)
    }
}

impl CacheStore for SqliteStore {
    fn load(&self) -> Result<HashMap<String, CacheEntry>, CapabilityError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, ts, data FROM geoip_cache")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;

            let mut entries = HashMap::new();
            for row in rows {
                let (key, ts, data) = row?;
                match serde_json::from_str::<Value>(&data) {
                    Ok(data) => {
                        entries.insert(key, CacheEntry { ts, data });
                    }
                    Err(e) => tracing::warn!(key = %key, error = %e, "Skipping corrupt cache row"),
                }
            }
            Ok(entries)
        })
    }

    fn save(&self, entries: &HashMap<String, CacheEntry>) -> Result<(), CapabilityError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM geoip_cache", [])?;
            {
                let mut stmt =
                    tx.prepare("INSERT INTO geoip_cache (key, ts, data) VALUES (?1, ?2, ?3)")?;
                for (key, entry) in entries {
                    stmt.execute(params![key, entry.ts, entry.data.to_string()])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish()
    }
}
