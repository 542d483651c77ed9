//! Persistent distance cache
//!
//! The cache is advisory: a failed lookup is a miss and a failed write is
//! only logged. Nothing in here is allowed to abort a batch.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::core::coords::CoordinatePair;
use crate::core::error::{Error, Result};

/// Table layout shared with caches written by earlier walk-distance tooling
const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS stop_distances \
     (lat1 REAL, lon1 REAL, lat2 REAL, lon2 REAL, d_walk INT)";

const CREATE_INDEX_SQL: &str = "CREATE UNIQUE INDEX IF NOT EXISTS coordinate_index \
     ON stop_distances (lat1, lon1, lat2, lon2)";

const LOOKUP_SQL: &str = "SELECT d_walk FROM stop_distances \
     WHERE lat1 = ?1 AND lon1 = ?2 AND lat2 = ?3 AND lon2 = ?4";

const UPSERT_SQL: &str = "INSERT OR REPLACE INTO stop_distances \
     (lat1, lon1, lat2, lon2, d_walk) VALUES (?1, ?2, ?3, ?4, ?5)";

/// Keyed cache of previously computed distances.
///
/// Implementations are shared by every worker of a batch, so they must accept
/// concurrent calls, including upserts issued while a batch transaction is open.
pub trait DistanceStore: Send + Sync {
    /// Cached distance for exactly this pair, if any
    fn lookup(&self, pair: &CoordinatePair) -> Option<i64>;

    /// Insert or replace the record for this pair. Returns true when exactly
    /// one record was written.
    fn upsert(&self, pair: &CoordinatePair, distance: i64) -> bool;

    /// Open a transaction that groups the following upserts
    fn begin_batch(&self) -> Result<()>;

    /// Commit the transaction opened by [`DistanceStore::begin_batch`]
    fn commit_batch(&self) -> Result<()>;
}

/// SQLite-backed [`DistanceStore`].
///
/// A single connection is guarded by a mutex, which serializes writers
/// underneath an open batch transaction.
pub struct SqliteDistanceStore {
    conn: Mutex<Option<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteDistanceStore {
    /// Open (or create) a cache database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        let store = Self::init(conn, Some(path.to_path_buf()))?;
        debug!("Opened distance cache {}", path.display());
        Ok(store)
    }

    /// Volatile cache, mostly useful for tests
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(CREATE_TABLE_SQL)?;
        conn.execute_batch(CREATE_INDEX_SQL)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path,
        })
    }

    /// Location of the backing file, `None` for in-memory caches
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of cached records
    pub fn len(&self) -> Result<usize> {
        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("distance cache is closed".to_string()))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM stop_distances", [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Close the connection. Later lookups miss and later upserts fail.
    pub fn close(&self) {
        if let Some(conn) = self.conn.lock().take() {
            if let Err((_, e)) = conn.close() {
                warn!("Closing distance cache failed: {e}");
            }
        }
    }
}

impl DistanceStore for SqliteDistanceStore {
    fn lookup(&self, pair: &CoordinatePair) -> Option<i64> {
        let guard = self.conn.lock();
        let conn = guard.as_ref()?;

        let result = conn.prepare_cached(LOOKUP_SQL).and_then(|mut stmt| {
            stmt.query_row(
                params![pair.from_lat, pair.from_lon, pair.to_lat, pair.to_lon],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()
        });

        match result {
            Ok(found) => found.flatten(),
            Err(e) => {
                warn!("Cache lookup failed for {pair}: {e}");
                None
            }
        }
    }

    fn upsert(&self, pair: &CoordinatePair, distance: i64) -> bool {
        // SQLite binds NaN as NULL, which would never match a lookup
        if !pair.is_finite() {
            warn!("Cache write skipped for {pair}: non-finite coordinates");
            return false;
        }

        let guard = self.conn.lock();
        let Some(conn) = guard.as_ref() else {
            warn!("Cache write skipped for {pair}: cache is closed");
            return false;
        };

        let result = conn.prepare_cached(UPSERT_SQL).and_then(|mut stmt| {
            stmt.execute(params![
                pair.from_lat,
                pair.from_lon,
                pair.to_lat,
                pair.to_lon,
                distance
            ])
        });

        match result {
            Ok(changed) => changed == 1,
            Err(e) => {
                warn!("Cache write failed for {pair}: {e}");
                false
            }
        }
    }

    fn begin_batch(&self) -> Result<()> {
        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("distance cache is closed".to_string()))?;
        conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit_batch(&self) -> Result<()> {
        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("distance cache is closed".to_string()))?;

        if let Err(e) = conn.execute_batch("COMMIT") {
            // Leave the connection in autocommit mode for whoever comes next
            if !conn.is_autocommit() {
                if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                    warn!("Rollback after failed commit also failed: {rollback}");
                }
            }
            return Err(e.into());
        }
        Ok(())
    }
}
