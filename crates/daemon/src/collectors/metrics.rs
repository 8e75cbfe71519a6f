// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance-level metrics sampler over `pg_stat_database` and settings.
//!
//! Produces the remaining known metrics: max_connections, cache hit ratio
//! (both 0–1 and percent forms), database size, and transactions per
//! second computed from commit+rollback counter deltas against the
//! previous sample.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::Row;
use tokio_util::sync::CancellationToken;

use pgvigil_core::{Clock, MetricRow, SystemClock};
use pgvigil_engine::{names, MetricRegistry};
use pgvigil_storage::Store;

use crate::pool::PoolManager;

use super::{bounded, pool_for, CollectError, Collector};

const SETTINGS_SQL: &str =
    "SELECT setting::float8 AS max_connections FROM pg_settings WHERE name = 'max_connections'";

const DATABASE_SQL: &str = "\
    SELECT xact_commit + xact_rollback AS xacts, \
           blks_hit::float8 AS blks_hit, \
           blks_read::float8 AS blks_read, \
           pg_database_size(current_database()) AS db_size \
    FROM pg_stat_database \
    WHERE datname = current_database()";

struct PrevSample {
    xacts: i64,
    at: std::time::Instant,
}

pub struct MetricsCollector {
    instance: String,
    interval: Duration,
    pools: Arc<PoolManager>,
    store: Store,
    registry: Option<Arc<MetricRegistry>>,
    prev: Mutex<Option<PrevSample>>,
    clock: SystemClock,
}

impl MetricsCollector {
    pub fn new(
        instance: String,
        interval: Duration,
        pools: Arc<PoolManager>,
        store: Store,
        registry: Option<Arc<MetricRegistry>>,
    ) -> Self {
        Self {
            instance,
            interval,
            pools,
            store,
            registry,
            prev: Mutex::new(None),
            clock: SystemClock,
        }
    }

    /// TPS from the counter delta; None until a second sample exists.
    fn tps(&self, xacts: i64) -> Option<f64> {
        let now = self.clock.now();
        let mut prev = self.prev.lock();
        let rate = prev.as_ref().and_then(|sample| {
            let elapsed = now.duration_since(sample.at).as_secs_f64();
            if elapsed <= 0.0 {
                return None;
            }
            let delta = (xacts - sample.xacts).max(0) as f64;
            Some(delta / elapsed)
        });
        *prev = Some(PrevSample { xacts, at: now });
        rate
    }
}

#[async_trait]
impl Collector for MetricsCollector {
    fn name(&self) -> &str {
        "metrics"
    }

    fn instance(&self) -> &str {
        &self.instance
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn collect(&self, _cancel: &CancellationToken) -> Result<(), CollectError> {
        let pool = pool_for(&self.pools, &self.instance)?;

        let settings = bounded(sqlx::query(SETTINGS_SQL).fetch_one(&pool)).await?;
        let max_connections: f64 = settings.try_get("max_connections")?;

        let db = bounded(sqlx::query(DATABASE_SQL).fetch_one(&pool)).await?;
        let xacts: i64 = db.try_get("xacts")?;
        let blks_hit: f64 = db.try_get("blks_hit")?;
        let blks_read: f64 = db.try_get("blks_read")?;
        let db_size: i64 = db.try_get("db_size")?;

        let total_blocks = blks_hit + blks_read;
        let cache_hit_ratio = if total_blocks > 0.0 { blks_hit / total_blocks } else { 1.0 };
        let tps = self.tps(xacts);

        let mut rows = vec![
            MetricRow { name: names::MAX_CONNECTIONS.to_string(), value: max_connections },
            MetricRow { name: names::CACHE_HIT_RATIO.to_string(), value: cache_hit_ratio },
            MetricRow {
                name: names::CACHE_HIT_RATIO_PCT.to_string(),
                value: cache_hit_ratio * 100.0,
            },
            MetricRow { name: names::DATABASE_SIZE.to_string(), value: db_size as f64 },
        ];
        if let Some(tps) = tps {
            rows.push(MetricRow { name: names::TPS.to_string(), value: tps });
        }

        self.store.insert_metrics(&self.instance, self.clock.epoch_secs(), &rows)?;

        if let Some(registry) = &self.registry {
            let at = self.clock.now_utc();
            for row in &rows {
                registry.set(&row.name, row.value, at);
            }
        }

        Ok(())
    }
}
