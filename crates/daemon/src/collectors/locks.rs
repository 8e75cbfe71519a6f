// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pg_locks` sampler, joined to the owning sessions so blocked/blocking
//! relationships survive into the snapshot.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::Row;
use tokio_util::sync::CancellationToken;

use pgvigil_core::{Clock, LockRow, SystemClock};
use pgvigil_storage::Store;

use crate::pool::PoolManager;

use super::{bounded, pool_for, CollectError, Collector};

const LOCKS_SQL: &str = "\
    SELECT l.pid, \
           l.locktype, \
           l.mode, \
           l.granted, \
           c.relname::text AS relation, \
           pg_blocking_pids(l.pid) AS blocking_pids \
    FROM pg_locks l \
    LEFT JOIN pg_class c ON c.oid = l.relation \
    WHERE l.pid IS NOT NULL \
      AND l.pid <> pg_backend_pid()";

pub struct LockCollector {
    instance: String,
    interval: Duration,
    pools: Arc<PoolManager>,
    store: Store,
    clock: SystemClock,
}

impl LockCollector {
    pub fn new(
        instance: String,
        interval: Duration,
        pools: Arc<PoolManager>,
        store: Store,
    ) -> Self {
        Self { instance, interval, pools, store, clock: SystemClock }
    }
}

#[async_trait]
impl Collector for LockCollector {
    fn name(&self) -> &str {
        "locks"
    }

    fn instance(&self) -> &str {
        &self.instance
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn collect(&self, _cancel: &CancellationToken) -> Result<(), CollectError> {
        let pool = pool_for(&self.pools, &self.instance)?;
        let rows = bounded(sqlx::query(LOCKS_SQL).fetch_all(&pool)).await?;

        let mut samples = Vec::with_capacity(rows.len());
        for row in &rows {
            samples.push(LockRow {
                pid: row.try_get("pid")?,
                locktype: row.try_get("locktype")?,
                mode: row.try_get("mode")?,
                granted: row.try_get("granted")?,
                relation: row.try_get("relation")?,
                blocking_pids: row.try_get("blocking_pids")?,
            });
        }

        self.store.insert_locks(&self.instance, self.clock.epoch_secs(), &samples)?;
        Ok(())
    }
}
