// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only snapshot inserts. Every row carries the instance name and a
//! unix-second timestamp; one database file holds data for the whole fleet.

use rusqlite::params;

use pgvigil_core::{ActivityRow, DeadlockEvent, LockRow, MetricRow, ReplicationLagRow};

use crate::store::{Store, StoreError};

impl Store {
    pub fn insert_activity(
        &self,
        instance: &str,
        timestamp: i64,
        rows: &[ActivityRow],
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO activity_snapshots
                     (instance_name, timestamp, pid, usename, datname, state,
                      wait_event, query_start, xact_start, query)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for row in rows {
                stmt.execute(params![
                    instance,
                    timestamp,
                    row.pid,
                    row.usename,
                    row.datname,
                    row.state,
                    row.wait_event,
                    row.query_start,
                    row.xact_start,
                    row.query,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_locks(
        &self,
        instance: &str,
        timestamp: i64,
        rows: &[LockRow],
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO lock_snapshots
                     (instance_name, timestamp, pid, locktype, mode, granted,
                      relation, blocking_pids)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for row in rows {
                let blocking = if row.blocking_pids.is_empty() {
                    None
                } else {
                    Some(
                        row.blocking_pids
                            .iter()
                            .map(|pid| pid.to_string())
                            .collect::<Vec<_>>()
                            .join(","),
                    )
                };
                stmt.execute(params![
                    instance,
                    timestamp,
                    row.pid,
                    row.locktype,
                    row.mode,
                    row.granted,
                    row.relation,
                    blocking,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_replication_lag(
        &self,
        instance: &str,
        timestamp: i64,
        rows: &[ReplicationLagRow],
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO replication_lag_history
                     (instance_name, timestamp, client_addr, state,
                      sent_lag_bytes, write_lag_bytes, flush_lag_bytes,
                      replay_lag_bytes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for row in rows {
                stmt.execute(params![
                    instance,
                    timestamp,
                    row.client_addr,
                    row.state,
                    row.sent_lag_bytes,
                    row.write_lag_bytes,
                    row.flush_lag_bytes,
                    row.replay_lag_bytes,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_metrics(
        &self,
        instance: &str,
        timestamp: i64,
        rows: &[MetricRow],
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO metrics_history (instance_name, timestamp, name, value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in rows {
                stmt.execute(params![instance, timestamp, row.name, row.value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Persist a reconstructed deadlock with its participant processes.
    pub fn insert_deadlock(
        &self,
        instance: &str,
        event: &DeadlockEvent,
    ) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO deadlock_events (instance_name, detected_at) VALUES (?1, ?2)",
            params![instance, event.detected_at],
        )?;
        let deadlock_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO deadlock_processes (deadlock_id, pid, query)
                 VALUES (?1, ?2, ?3)",
            )?;
            for process in &event.processes {
                stmt.execute(params![deadlock_id, process.pid, process.query])?;
            }
        }
        tx.commit()?;
        Ok(deadlock_id)
    }
}
