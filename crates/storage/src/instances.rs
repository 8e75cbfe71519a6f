// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agent_instances` accessors. Upserted by the pool manager on state
//! changes; connection strings are stored redacted.

use rusqlite::params;

use pgvigil_core::{InstanceRecord, InstanceStatus};

use crate::store::{Store, StoreError};

impl Store {
    pub fn upsert_instance(&self, record: &InstanceRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO agent_instances
                 (name, connection_string, status, last_seen, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(name) DO UPDATE SET
                 connection_string = excluded.connection_string,
                 status = excluded.status,
                 last_seen = excluded.last_seen,
                 error_message = excluded.error_message",
            params![
                record.name,
                record.connection_redacted,
                record.status.as_str(),
                record.last_seen,
                record.error_message,
            ],
        )?;
        Ok(())
    }

    pub fn instances(&self) -> Result<Vec<InstanceRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT name, connection_string, status, last_seen, error_message
             FROM agent_instances ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| {
            let status: String = row.get(2)?;
            Ok(InstanceRecord {
                name: row.get(0)?,
                connection_redacted: row.get(1)?,
                status: InstanceStatus::parse(&status).unwrap_or(InstanceStatus::Unknown),
                last_seen: row.get(3)?,
                error_message: row.get(4)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
