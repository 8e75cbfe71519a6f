// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retention sweeper: hourly batched deletes per policy table.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pgvigil_core::{Clock, Retention, SystemClock};
use pgvigil_storage::{Store, PRUNE_BATCH_SIZE};

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Pause between delete batches so concurrent readers of the WAL-mode file
/// get a turn. A tuning constant, like the batch cap.
const BATCH_YIELD: Duration = Duration::from_millis(10);

/// One table under retention.
#[derive(Debug, Clone)]
pub struct PolicyEntry {
    pub table: &'static str,
    pub ts_column: &'static str,
    pub retention: Duration,
}

/// Map the configured retention windows onto their tables.
pub fn policy_from(retention: &Retention) -> Vec<PolicyEntry> {
    vec![
        PolicyEntry {
            table: "activity_snapshots",
            ts_column: "timestamp",
            retention: retention.activity_history,
        },
        PolicyEntry {
            table: "lock_snapshots",
            ts_column: "timestamp",
            retention: retention.lock_history,
        },
        PolicyEntry {
            table: "query_stats",
            ts_column: "last_seen",
            retention: retention.query_stats,
        },
        PolicyEntry {
            table: "replication_lag_history",
            ts_column: "timestamp",
            retention: retention.replication_lag,
        },
        PolicyEntry {
            table: "metrics_history",
            ts_column: "timestamp",
            retention: retention.metrics,
        },
    ]
}

pub struct RetentionSweeper {
    store: Store,
    policy: Vec<PolicyEntry>,
    clock: SystemClock,
}

impl RetentionSweeper {
    pub fn new(store: Store, policy: Vec<PolicyEntry>) -> Self {
        Self { store, policy, clock: SystemClock }
    }

    /// One full pass over the policy. A failing table is logged and
    /// skipped; the cycle continues.
    pub async fn sweep_once(&self) {
        for entry in &self.policy {
            let cutoff = self.clock.epoch_secs() - entry.retention.as_secs() as i64;
            let mut total = 0usize;
            loop {
                match self.store.prune_batch(
                    entry.table,
                    entry.ts_column,
                    cutoff,
                    PRUNE_BATCH_SIZE,
                ) {
                    Ok(deleted) => {
                        total += deleted;
                        // A short batch means the table is done.
                        if deleted < PRUNE_BATCH_SIZE {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(table = entry.table, error = %err, "retention prune failed");
                        break;
                    }
                }
                tokio::time::sleep(BATCH_YIELD).await;
            }
            if total > 0 {
                info!(table = entry.table, deleted = total, "retention sweep");
            }
        }
    }

    /// Immediate sweep, then hourly until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        self.sweep_once().await;
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + SWEEP_INTERVAL,
            SWEEP_INTERVAL,
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.sweep_once().await,
            }
        }
        debug!("retention sweeper stopped");
    }
}

#[cfg(test)]
#[path = "retention_tests.rs"]
mod tests;
