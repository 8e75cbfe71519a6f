// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `alert_events` accessors. Append-only; rows are pruned by the retention
//! sweeper, not rewritten.

use rusqlite::params;

use pgvigil_core::AlertEventRecord;

use crate::store::{Store, StoreError};

impl Store {
    /// Append a state-transition event; returns the new row id.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_alert_event(
        &self,
        rule_name: &str,
        prev_state: &str,
        new_state: &str,
        metric_value: f64,
        threshold_value: f64,
        triggered_at: i64,
    ) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO alert_events
                 (rule_name, prev_state, new_state, metric_value,
                  threshold_value, triggered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![rule_name, prev_state, new_state, metric_value, threshold_value, triggered_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Stamp the most recent event for a rule as acknowledged.
    pub fn acknowledge_alert_event(
        &self,
        rule_name: &str,
        acknowledged_by: &str,
        acknowledged_at: i64,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE alert_events
             SET acknowledged_at = ?1, acknowledged_by = ?2
             WHERE id = (SELECT MAX(id) FROM alert_events WHERE rule_name = ?3)",
            params![acknowledged_at, acknowledged_by, rule_name],
        )?;
        Ok(())
    }

    /// Newest-first event history.
    pub fn recent_alert_events(&self, limit: usize) -> Result<Vec<AlertEventRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, rule_name, prev_state, new_state, metric_value,
                    threshold_value, triggered_at, acknowledged_at, acknowledged_by
             FROM alert_events ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(AlertEventRecord {
                id: row.get(0)?,
                rule_name: row.get(1)?,
                prev_state: row.get(2)?,
                new_state: row.get(3)?,
                metric_value: row.get(4)?,
                threshold_value: row.get(5)?,
                triggered_at: row.get(6)?,
                acknowledged_at: row.get(7)?,
                acknowledged_by: row.get(8)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
