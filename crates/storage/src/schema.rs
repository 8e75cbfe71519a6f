// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema migrations gated on `PRAGMA user_version`.

use rusqlite::Connection;

use crate::store::StoreError;

/// Compiled-in schema version. A stored version above this is fatal (the
/// database belongs to a newer agent); below it, forward migrations run in
/// order.
pub const SCHEMA_VERSION: i64 = 1;

const MIGRATIONS: &[&str] = &[SCHEMA_V1];

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS agent_status (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    pid INTEGER NOT NULL,
    start_time INTEGER NOT NULL,
    last_collect INTEGER,
    version TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    error_count INTEGER NOT NULL DEFAULT 0,
    last_error TEXT
);

CREATE TABLE IF NOT EXISTS agent_instances (
    name TEXT PRIMARY KEY,
    connection_string TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'unknown'
        CHECK (status IN ('unknown', 'connected', 'disconnected', 'error')),
    last_seen INTEGER,
    error_message TEXT
);

CREATE TABLE IF NOT EXISTS activity_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    instance_name TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    pid INTEGER NOT NULL,
    usename TEXT,
    datname TEXT,
    state TEXT,
    wait_event TEXT,
    query_start INTEGER,
    xact_start INTEGER,
    query TEXT
);
CREATE INDEX IF NOT EXISTS idx_activity_snapshots_ts
    ON activity_snapshots (timestamp);

CREATE TABLE IF NOT EXISTS lock_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    instance_name TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    pid INTEGER NOT NULL,
    locktype TEXT NOT NULL,
    mode TEXT NOT NULL,
    granted INTEGER NOT NULL,
    relation TEXT,
    blocking_pids TEXT
);
CREATE INDEX IF NOT EXISTS idx_lock_snapshots_ts
    ON lock_snapshots (timestamp);

CREATE TABLE IF NOT EXISTS deadlock_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    instance_name TEXT NOT NULL,
    detected_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_deadlock_events_detected
    ON deadlock_events (detected_at);

CREATE TABLE IF NOT EXISTS deadlock_processes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    deadlock_id INTEGER NOT NULL
        REFERENCES deadlock_events(id) ON DELETE CASCADE,
    pid INTEGER NOT NULL,
    query TEXT
);

CREATE TABLE IF NOT EXISTS replication_lag_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    instance_name TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    client_addr TEXT,
    state TEXT,
    sent_lag_bytes INTEGER NOT NULL,
    write_lag_bytes INTEGER NOT NULL,
    flush_lag_bytes INTEGER NOT NULL,
    replay_lag_bytes INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_replication_lag_history_ts
    ON replication_lag_history (timestamp);

CREATE TABLE IF NOT EXISTS metrics_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    instance_name TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    name TEXT NOT NULL,
    value REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_metrics_history_ts
    ON metrics_history (timestamp);

CREATE TABLE IF NOT EXISTS query_stats (
    fingerprint TEXT NOT NULL,
    instance_name TEXT NOT NULL,
    query TEXT NOT NULL,
    calls INTEGER NOT NULL,
    total_ms REAL NOT NULL,
    mean_ms REAL NOT NULL,
    rows_returned INTEGER NOT NULL,
    last_seen INTEGER NOT NULL,
    PRIMARY KEY (fingerprint, instance_name)
);

CREATE TABLE IF NOT EXISTS alert_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    rule_name TEXT NOT NULL,
    prev_state TEXT NOT NULL,
    new_state TEXT NOT NULL,
    metric_value REAL NOT NULL,
    threshold_value REAL NOT NULL,
    triggered_at INTEGER NOT NULL,
    acknowledged_at INTEGER,
    acknowledged_by TEXT
);
CREATE INDEX IF NOT EXISTS idx_alert_events_triggered
    ON alert_events (triggered_at);
"#;

/// Read the stored version, reject a database from a newer agent, and run
/// any pending forward migrations.
pub(crate) fn migrate(conn: &Connection) -> Result<(), StoreError> {
    let found: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if found > SCHEMA_VERSION {
        return Err(StoreError::SchemaNewerThanBinary { found, supported: SCHEMA_VERSION });
    }

    for (index, migration) in MIGRATIONS.iter().enumerate() {
        let version = index as i64 + 1;
        if version > found {
            conn.execute_batch(migration)?;
            conn.pragma_update(None, "user_version", version)?;
            tracing::info!(version, "applied schema migration");
        }
    }

    Ok(())
}
