// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pg_stat_replication` sampler: per-standby byte lag behind the
//! primary's current WAL position.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::Row;
use tokio_util::sync::CancellationToken;

use pgvigil_core::{Clock, ReplicationLagRow, SystemClock};
use pgvigil_engine::{names, MetricRegistry};
use pgvigil_storage::Store;

use crate::pool::PoolManager;

use super::{bounded, pool_for, CollectError, Collector};

const REPLICATION_SQL: &str = "\
    SELECT client_addr::text AS client_addr, \
           state, \
           COALESCE(pg_wal_lsn_diff(pg_current_wal_lsn(), sent_lsn), 0)::bigint AS sent_lag, \
           COALESCE(pg_wal_lsn_diff(pg_current_wal_lsn(), write_lsn), 0)::bigint AS write_lag, \
           COALESCE(pg_wal_lsn_diff(pg_current_wal_lsn(), flush_lsn), 0)::bigint AS flush_lag, \
           COALESCE(pg_wal_lsn_diff(pg_current_wal_lsn(), replay_lsn), 0)::bigint AS replay_lag \
    FROM pg_stat_replication";

pub struct ReplicationCollector {
    instance: String,
    interval: Duration,
    pools: Arc<PoolManager>,
    store: Store,
    registry: Option<Arc<MetricRegistry>>,
    clock: SystemClock,
}

impl ReplicationCollector {
    pub fn new(
        instance: String,
        interval: Duration,
        pools: Arc<PoolManager>,
        store: Store,
        registry: Option<Arc<MetricRegistry>>,
    ) -> Self {
        Self { instance, interval, pools, store, registry, clock: SystemClock }
    }
}

#[async_trait]
impl Collector for ReplicationCollector {
    fn name(&self) -> &str {
        "replication"
    }

    fn instance(&self) -> &str {
        &self.instance
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn collect(&self, _cancel: &CancellationToken) -> Result<(), CollectError> {
        let pool = pool_for(&self.pools, &self.instance)?;
        let rows = bounded(sqlx::query(REPLICATION_SQL).fetch_all(&pool)).await?;

        let mut samples = Vec::with_capacity(rows.len());
        let mut worst_replay_lag: i64 = 0;
        for row in &rows {
            let sample = ReplicationLagRow {
                client_addr: row.try_get("client_addr")?,
                state: row.try_get("state")?,
                sent_lag_bytes: row.try_get("sent_lag")?,
                write_lag_bytes: row.try_get("write_lag")?,
                flush_lag_bytes: row.try_get("flush_lag")?,
                replay_lag_bytes: row.try_get("replay_lag")?,
            };
            worst_replay_lag = worst_replay_lag.max(sample.replay_lag_bytes);
            samples.push(sample);
        }

        if !samples.is_empty() {
            self.store.insert_replication_lag(
                &self.instance,
                self.clock.epoch_secs(),
                &samples,
            )?;
        }

        // No standbys means no lag; publish zero so rules keep evaluating.
        if let Some(registry) = &self.registry {
            registry.set(
                names::REPLICATION_LAG_BYTES,
                worst_replay_lag as f64,
                self.clock.now_utc(),
            );
        }

        Ok(())
    }
}
