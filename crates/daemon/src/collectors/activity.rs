// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pg_stat_activity` sampler.
//!
//! Persists a per-session snapshot and derives the session-shaped metrics
//! (active connection count, longest transaction, longest idle-in-
//! transaction). The agent's own sessions are excluded by application name.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::Row;
use tokio_util::sync::CancellationToken;

use pgvigil_core::{ActivityRow, Clock, SystemClock};
use pgvigil_engine::{names, MetricRegistry};
use pgvigil_storage::Store;

use crate::pool::{PoolManager, APPLICATION_NAME};

use super::{bounded, pool_for, CollectError, Collector};

const ACTIVITY_SQL: &str = "\
    SELECT pid, \
           usename::text AS usename, \
           datname::text AS datname, \
           state, \
           wait_event, \
           EXTRACT(EPOCH FROM query_start)::bigint AS query_start, \
           EXTRACT(EPOCH FROM xact_start)::bigint AS xact_start, \
           LEFT(query, 500) AS query, \
           COALESCE(EXTRACT(EPOCH FROM now() - xact_start), 0)::float8 AS xact_age, \
           COALESCE(EXTRACT(EPOCH FROM now() - state_change), 0)::float8 AS state_age \
    FROM pg_stat_activity \
    WHERE pid <> pg_backend_pid() \
      AND backend_type = 'client backend' \
      AND COALESCE(application_name, '') <> $1";

pub struct ActivityCollector {
    instance: String,
    interval: Duration,
    pools: Arc<PoolManager>,
    store: Store,
    /// Present only for the default instance, which feeds the alert engine.
    registry: Option<Arc<MetricRegistry>>,
    clock: SystemClock,
}

impl ActivityCollector {
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
impl Collector for ActivityCollector {
    fn name(&self) -> &str {
        "activity"
    }

    fn instance(&self) -> &str {
        &self.instance
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn collect(&self, _cancel: &CancellationToken) -> Result<(), CollectError> {
        let pool = pool_for(&self.pools, &self.instance)?;
        let rows = bounded(sqlx::query(ACTIVITY_SQL).bind(APPLICATION_NAME).fetch_all(&pool))
            .await?;

        let mut samples = Vec::with_capacity(rows.len());
        let mut active = 0u32;
        let mut longest_xact = 0f64;
        let mut longest_idle_in_xact = 0f64;

        for row in &rows {
            let state: Option<String> = row.try_get("state")?;
            let xact_age: f64 = row.try_get("xact_age")?;
            let state_age: f64 = row.try_get("state_age")?;

            match state.as_deref() {
                Some("active") => {
                    active += 1;
                    longest_xact = longest_xact.max(xact_age);
                }
                Some("idle in transaction") => {
                    longest_xact = longest_xact.max(xact_age);
                    longest_idle_in_xact = longest_idle_in_xact.max(state_age);
                }
                _ => {}
            }

            samples.push(ActivityRow {
                pid: row.try_get("pid")?,
                usename: row.try_get("usename")?,
                datname: row.try_get("datname")?,
                state,
                wait_event: row.try_get("wait_event")?,
                query_start: row.try_get("query_start")?,
                xact_start: row.try_get("xact_start")?,
                query: row.try_get("query")?,
            });
        }

        let now = self.clock.epoch_secs();
        self.store.insert_activity(&self.instance, now, &samples)?;

        if let Some(registry) = &self.registry {
            let at = self.clock.now_utc();
            registry.set(names::ACTIVE_CONNECTIONS, f64::from(active), at);
            registry.set(names::LONGEST_TRANSACTION_SECONDS, longest_xact, at);
            registry.set(names::IDLE_IN_TRANSACTION_SECONDS, longest_idle_in_xact, at);
        }

        Ok(())
    }
}
