// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agent_status` singleton accessors.
//!
//! The row is created at startup and deleted on clean shutdown; its absence
//! after a crash is detected by the next start but is not fatal. The id=1
//! CHECK constraint enforces the singleton at the schema level.

use rusqlite::{params, OptionalExtension};

use pgvigil_core::AgentStatusRecord;

use crate::store::{Store, StoreError};

impl Store {
    /// Create or replace the singleton status row.
    pub fn upsert_agent_status(&self, record: &AgentStatusRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO agent_status
                 (id, pid, start_time, last_collect, version, config_hash,
                  error_count, last_error)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 pid = excluded.pid,
                 start_time = excluded.start_time,
                 last_collect = excluded.last_collect,
                 version = excluded.version,
                 config_hash = excluded.config_hash,
                 error_count = excluded.error_count,
                 last_error = excluded.last_error",
            params![
                record.pid,
                record.start_time,
                record.last_collect,
                record.version,
                record.config_hash,
                record.error_count,
                record.last_error,
            ],
        )?;
        Ok(())
    }

    pub fn agent_status(&self) -> Result<Option<AgentStatusRecord>, StoreError> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT pid, start_time, last_collect, version, config_hash,
                        error_count, last_error
                 FROM agent_status WHERE id = 1",
                [],
                |row| {
                    Ok(AgentStatusRecord {
                        pid: row.get(0)?,
                        start_time: row.get(1)?,
                        last_collect: row.get(2)?,
                        version: row.get(3)?,
                        config_hash: row.get(4)?,
                        error_count: row.get(5)?,
                        last_error: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Advance `last_collect` after any collector's successful cycle.
    pub fn touch_last_collect(&self, timestamp: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE agent_status SET last_collect = ?1 WHERE id = 1",
            params![timestamp],
        )?;
        Ok(())
    }

    /// Record a collector failure: bump the error counter, keep the message.
    pub fn record_agent_error(&self, message: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE agent_status
             SET error_count = error_count + 1, last_error = ?1
             WHERE id = 1",
            params![message],
        )?;
        Ok(())
    }

    /// Remove the singleton; its absence signals clean shutdown.
    pub fn delete_agent_status(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM agent_status WHERE id = 1", [])?;
        Ok(())
    }
}
