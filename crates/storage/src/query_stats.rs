// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `query_stats` accessors: aggregated per-fingerprint statistics, upserted
//! with absolute counter values from the source view; `last_seen` advances
//! on every upsert.

use rusqlite::params;

use pgvigil_core::QueryStatRow;

use crate::store::{Store, StoreError};

impl Store {
    pub fn upsert_query_stats(
        &self,
        instance: &str,
        last_seen: i64,
        rows: &[QueryStatRow],
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO query_stats
                     (fingerprint, instance_name, query, calls, total_ms,
                      mean_ms, rows_returned, last_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(fingerprint, instance_name) DO UPDATE SET
                     query = excluded.query,
                     calls = excluded.calls,
                     total_ms = excluded.total_ms,
                     mean_ms = excluded.mean_ms,
                     rows_returned = excluded.rows_returned,
                     last_seen = excluded.last_seen",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.fingerprint,
                    instance,
                    row.query,
                    row.calls,
                    row.total_ms,
                    row.mean_ms,
                    row.rows,
                    last_seen,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn query_stats(&self, instance: &str) -> Result<Vec<QueryStatRow>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT fingerprint, query, calls, total_ms, mean_ms, rows_returned
             FROM query_stats WHERE instance_name = ?1
             ORDER BY total_ms DESC",
        )?;
        let rows = stmt.query_map(params![instance], |row| {
            Ok(QueryStatRow {
                fingerprint: row.get(0)?,
                query: row.get(1)?,
                calls: row.get(2)?,
                total_ms: row.get(3)?,
                mean_ms: row.get(4)?,
                rows: row.get(5)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
