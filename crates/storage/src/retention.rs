// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batched retention deletes.
//!
//! One call removes at most [`PRUNE_BATCH_SIZE`] rows; the sweeper loops
//! until a batch comes back short, yielding between batches so concurrent
//! readers of the WAL-mode file are not starved.

use rusqlite::params;

use crate::store::{Store, StoreError, TABLES};

/// Row cap per delete batch. A tuning constant, not configuration: together
/// with the sweeper's inter-batch yield it bounds writer impact on readers.
pub const PRUNE_BATCH_SIZE: usize = 10_000;

impl Store {
    /// Delete up to `limit` rows with `ts_column < cutoff`. Returns the
    /// number of rows actually deleted; a return below `limit` means the
    /// table is fully pruned for this cutoff.
    pub fn prune_batch(
        &self,
        table: &str,
        ts_column: &str,
        cutoff: i64,
        limit: usize,
    ) -> Result<usize, StoreError> {
        if !TABLES.contains(&table) {
            return Err(StoreError::UnknownTable(table.to_string()));
        }
        if !["timestamp", "last_seen", "detected_at", "triggered_at"].contains(&ts_column) {
            return Err(StoreError::UnknownTable(format!("{table}.{ts_column}")));
        }

        let conn = self.conn.lock();
        let deleted = conn.execute(
            &format!(
                "DELETE FROM {table} WHERE rowid IN
                     (SELECT rowid FROM {table} WHERE {ts_column} < ?1 LIMIT ?2)"
            ),
            params![cutoff, limit as i64],
        )?;
        Ok(deleted)
    }
}

#[cfg(test)]
#[path = "retention_tests.rs"]
mod tests;
