// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pg_stat_statements` sampler.
//!
//! The extension is optional; availability is probed once per daemon run
//! and a missing extension downgrades this collector to a no-op with a
//! single warning. Fingerprints are the view's queryid, aggregated in the
//! store by (fingerprint, instance).

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::Row;
use tokio_util::sync::CancellationToken;

use pgvigil_core::{Clock, QueryStatRow, SystemClock};
use pgvigil_storage::Store;

use crate::pool::PoolManager;

use super::{bounded, pool_for, CollectError, Collector};

const EXTENSION_SQL: &str =
    "SELECT COUNT(*) AS n FROM pg_extension WHERE extname = 'pg_stat_statements'";

/// Top consumers by total execution time; the cap bounds snapshot size on
/// busy instances.
const STATEMENTS_SQL: &str = "\
    SELECT queryid::text AS fingerprint, \
           LEFT(query, 500) AS query, \
           calls, \
           total_exec_time AS total_ms, \
           mean_exec_time AS mean_ms, \
           rows AS rows_returned \
    FROM pg_stat_statements \
    WHERE queryid IS NOT NULL \
    ORDER BY total_exec_time DESC \
    LIMIT 200";

pub struct QueryStatsCollector {
    instance: String,
    interval: Duration,
    pools: Arc<PoolManager>,
    store: Store,
    available: OnceLock<bool>,
    clock: SystemClock,
}

impl QueryStatsCollector {
    pub fn new(
        instance: String,
        interval: Duration,
        pools: Arc<PoolManager>,
        store: Store,
    ) -> Self {
        Self { instance, interval, pools, store, available: OnceLock::new(), clock: SystemClock }
    }

    async fn extension_available(&self, pool: &sqlx::PgPool) -> Result<bool, CollectError> {
        if let Some(available) = self.available.get() {
            return Ok(*available);
        }
        let row = bounded(sqlx::query(EXTENSION_SQL).fetch_one(pool)).await?;
        let count: i64 = row.try_get("n")?;
        let available = count > 0;
        if !available {
            tracing::warn!(
                instance = %self.instance,
                "pg_stat_statements is not installed; query statistics disabled"
            );
        }
        let _ = self.available.set(available);
        Ok(available)
    }
}

#[async_trait]
impl Collector for QueryStatsCollector {
    fn name(&self) -> &str {
        "queries"
    }

    fn instance(&self) -> &str {
        &self.instance
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn collect(&self, _cancel: &CancellationToken) -> Result<(), CollectError> {
        let pool = pool_for(&self.pools, &self.instance)?;
        if !self.extension_available(&pool).await? {
            return Ok(());
        }

        let rows = bounded(sqlx::query(STATEMENTS_SQL).fetch_all(&pool)).await?;
        let mut samples = Vec::with_capacity(rows.len());
        for row in &rows {
            samples.push(QueryStatRow {
                fingerprint: row.try_get("fingerprint")?,
                query: row.try_get("query")?,
                calls: row.try_get("calls")?,
                total_ms: row.try_get("total_ms")?,
                mean_ms: row.try_get("mean_ms")?,
                rows: row.try_get("rows_returned")?,
            });
        }

        self.store.upsert_query_stats(&self.instance, self.clock.epoch_secs(), &samples)?;
        Ok(())
    }
}
