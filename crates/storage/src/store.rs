// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store handle and open/close sequence.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::Connection;
use thiserror::Error;
use tracing::{debug, warn};

use crate::schema;

/// How long a writer waits on a locked database before giving up. Shared
/// with external readers of the same file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// All tables the store knows about; guards dynamically-built statements
/// (row counts, retention deletes).
pub(crate) const TABLES: &[&str] = &[
    "agent_status",
    "agent_instances",
    "activity_snapshots",
    "lock_snapshots",
    "deadlock_events",
    "deadlock_processes",
    "replication_lag_history",
    "metrics_history",
    "query_stats",
    "alert_events",
];

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "database schema version {found} is newer than supported version {supported}; \
         upgrade the agent"
    )]
    SchemaNewerThanBinary { found: i64, supported: i64 },

    #[error("unknown table {0:?}")]
    UnknownTable(String),
}

/// Handle to the embedded database. Cheap to clone; all clones share one
/// connection behind a mutex so statements never interleave mid-write.
#[derive(Clone, Debug)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Store {
    /// Open (or create) the database file, configure WAL mode and the busy
    /// timeout, and run forward migrations. Fails if the stored schema
    /// version is newer than this binary supports.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // journal_mode returns the resulting mode as a row.
        let mode: String =
            conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            warn!(mode = %mode, "write-ahead journal mode unavailable");
        }
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        schema::migrate(&conn)?;
        debug!(path = %path.display(), "store opened");

        Ok(Self { conn: Arc::new(Mutex::new(conn)), path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move committed WAL frames into the main file and truncate the log.
    /// Run once at shutdown so external readers see a compact file.
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        // Returns (busy, log_frames, checkpointed_frames).
        let busy: i64 =
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |row| row.get(0))?;
        if busy != 0 {
            warn!("wal checkpoint could not complete: readers active");
        }
        Ok(())
    }

    /// Row count for a known table.
    pub fn count_rows(&self, table: &str) -> Result<i64, StoreError> {
        if !TABLES.contains(&table) {
            return Err(StoreError::UnknownTable(table.to_string()));
        }
        let conn = self.conn.lock();
        let count =
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
