// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-instance connection pool manager.
//!
//! One bounded `PgPool` per configured instance. The map of pools sits
//! behind an exclusive lock; instance-record updates always happen after
//! the lock is released so a slow store write can never block acquires.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Executor, PgPool};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pgvigil_core::{
    has_password, redact_conn_string, Clock, InstanceConfig, InstanceRecord, InstanceStatus,
    SystemClock,
};
use pgvigil_storage::Store;

use crate::env;

/// Deterministic application name so the agent can exclude its own
/// sessions from its own collectors.
pub const APPLICATION_NAME: &str = "pgvigil-agent";

/// Pool bounds per instance.
const POOL_MAX: u32 = 5;
const POOL_MIN: u32 = 1;
const IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Initial connect deadline; health pings use the shorter probe deadline.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const PING_TIMEOUT: Duration = Duration::from_secs(5);

const RECONNECT_ATTEMPTS: u32 = 3;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Health-check cadence started by the lifecycle root.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Pool errors always carry the instance name; a failing instance degrades
/// the fleet, it never takes the manager down.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("instance {instance}: invalid connection string: {source}")]
    Parse { instance: String, source: sqlx::Error },

    #[error("instance {instance}: ping failed: {source}")]
    Ping { instance: String, source: sqlx::Error },

    #[error("instance {instance}: reconnect gave up after {attempts} attempts")]
    ReconnectExhausted { instance: String, attempts: u32 },

    #[error("unknown instance {0:?}")]
    Unknown(String),

    #[error("no instance could be connected")]
    NoneConnected,
}

struct Entry {
    config: InstanceConfig,
    pool: Option<PgPool>,
}

pub struct PoolManager {
    store: Store,
    clock: SystemClock,
    inner: Mutex<HashMap<String, Entry>>,
}

impl PoolManager {
    pub fn new(store: Store, instances: &[InstanceConfig]) -> Self {
        let inner = instances
            .iter()
            .map(|config| {
                (config.name.clone(), Entry { config: config.clone(), pool: None })
            })
            .collect();
        Self { store, clock: SystemClock, inner: Mutex::new(inner) }
    }

    /// Connect one instance: parse, build the bounded pool, ping. On
    /// success the instance record flips to connected.
    pub async fn connect(&self, name: &str) -> Result<(), PoolError> {
        let config = self.config_for(name)?;

        let options = match Self::build_options(&config) {
            Ok(options) => options,
            Err(err) => {
                self.record_status(&config, InstanceStatus::Error, Some(err.to_string()));
                return Err(err);
            }
        };

        let pool = Self::build_pool(options);
        if let Err(source) = Self::ping(&pool, CONNECT_TIMEOUT).await {
            pool.close().await;
            let err = PoolError::Ping { instance: config.name.clone(), source };
            self.record_status(&config, InstanceStatus::Error, Some(err.to_string()));
            return Err(err);
        }

        let version = Self::server_version(&pool).await;

        {
            let mut inner = self.inner.lock();
            if let Some(entry) = inner.get_mut(name) {
                entry.pool = Some(pool);
            }
        }
        self.record_status(&config, InstanceStatus::Connected, None);
        info!(instance = %config.name, server_version = %version, "connected");
        Ok(())
    }

    async fn server_version(pool: &PgPool) -> String {
        use sqlx::Row;
        let fetched = tokio::time::timeout(
            PING_TIMEOUT,
            sqlx::query("SELECT current_setting('server_version') AS v").fetch_one(pool),
        )
        .await;
        match fetched {
            Ok(Ok(row)) => row.try_get("v").unwrap_or_else(|_| "unknown".to_string()),
            _ => "unknown".to_string(),
        }
    }

    /// Best-effort connect of the whole fleet; errors only when nothing
    /// connected at all. Returns the connected instance names.
    pub async fn connect_all(&self) -> Result<Vec<String>, PoolError> {
        let names: Vec<String> = {
            let inner = self.inner.lock();
            let mut names: Vec<String> = inner.keys().cloned().collect();
            names.sort();
            names
        };

        let mut connected = Vec::new();
        for name in names {
            match self.connect(&name).await {
                Ok(()) => connected.push(name),
                Err(err) => warn!(instance = %name, error = %err, "connect failed"),
            }
        }

        if connected.is_empty() {
            return Err(PoolError::NoneConnected);
        }
        Ok(connected)
    }

    /// Pool handle for an instance, if connected. `PgPool` is internally
    /// reference-counted, so the clone is cheap.
    pub fn get(&self, name: &str) -> Option<PgPool> {
        self.inner.lock().get(name).and_then(|entry| entry.pool.clone())
    }

    /// The instance literally named "default", else the first connected
    /// instance by name.
    pub fn get_default(&self) -> Option<(String, PgPool)> {
        let inner = self.inner.lock();
        if let Some(entry) = inner.get("default") {
            if let Some(pool) = &entry.pool {
                return Some(("default".to_string(), pool.clone()));
            }
        }
        let mut names: Vec<&String> = inner.keys().collect();
        names.sort();
        for name in names {
            if let Some(pool) = inner.get(name).and_then(|entry| entry.pool.clone()) {
                return Some((name.clone(), pool));
            }
        }
        None
    }

    /// Reconnect with bounded retries and a linear delay multiplier.
    pub async fn reconnect(&self, name: &str) -> Result<(), PoolError> {
        let config = self.config_for(name)?;

        let old = self.inner.lock().get_mut(name).and_then(|entry| entry.pool.take());
        if let Some(pool) = old {
            pool.close().await;
        }
        self.record_status(&config, InstanceStatus::Disconnected, None);

        for attempt in 1..=RECONNECT_ATTEMPTS {
            match self.connect(name).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(instance = %name, attempt, error = %err, "reconnect attempt failed");
                }
            }
            if attempt < RECONNECT_ATTEMPTS {
                tokio::time::sleep(RECONNECT_DELAY * attempt).await;
            }
        }

        Err(PoolError::ReconnectExhausted {
            instance: name.to_string(),
            attempts: RECONNECT_ATTEMPTS,
        })
    }

    /// Ping every pool; reconnect the ones that fail the probe or have no
    /// pool at all.
    pub async fn reconnect_all(&self) {
        let names: Vec<String> = {
            let inner = self.inner.lock();
            let mut names: Vec<String> = inner.keys().cloned().collect();
            names.sort();
            names
        };

        for name in names {
            let healthy = match self.get(&name) {
                Some(pool) => Self::ping(&pool, PING_TIMEOUT).await.is_ok(),
                None => false,
            };
            if healthy {
                debug!(instance = %name, "health check ok");
                continue;
            }
            if let Err(err) = self.reconnect(&name).await {
                warn!(instance = %name, error = %err, "reconnect failed");
            }
        }
    }

    /// Spawn the periodic health-check loop.
    pub fn start_health_check(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => manager.reconnect_all().await,
                }
            }
            debug!("health check loop stopped");
        })
    }

    /// Close all pools and clear the map.
    pub async fn close(&self) {
        let entries: Vec<Entry> = {
            let mut inner = self.inner.lock();
            inner.drain().map(|(_, entry)| entry).collect()
        };
        for entry in entries {
            if let Some(pool) = entry.pool {
                pool.close().await;
            }
        }
    }

    fn config_for(&self, name: &str) -> Result<InstanceConfig, PoolError> {
        self.inner
            .lock()
            .get(name)
            .map(|entry| entry.config.clone())
            .ok_or_else(|| PoolError::Unknown(name.to_string()))
    }

    fn build_options(config: &InstanceConfig) -> Result<PgConnectOptions, PoolError> {
        let mut options = PgConnectOptions::from_str(&config.connection)
            .map_err(|source| PoolError::Parse { instance: config.name.clone(), source })?
            .application_name(APPLICATION_NAME);
        if !has_password(&config.connection) {
            if let Some(password) = env::db_password() {
                options = options.password(&password);
            }
        }
        Ok(options)
    }

    fn build_pool(options: PgConnectOptions) -> PgPool {
        PgPoolOptions::new()
            .max_connections(POOL_MAX)
            .min_connections(POOL_MIN)
            .acquire_timeout(CONNECT_TIMEOUT)
            .idle_timeout(IDLE_TIMEOUT)
            .max_lifetime(MAX_LIFETIME)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    // Keep the agent's own sessions out of the server's
                    // statement logs. Roles without the privilege just keep
                    // the server defaults.
                    let _ = conn.execute("SET log_statement = 'none'").await;
                    let _ = conn.execute("SET log_duration = off").await;
                    let _ = conn.execute("SET log_min_duration_statement = -1").await;
                    Ok(())
                })
            })
            .connect_lazy_with(options)
    }

    async fn ping(pool: &PgPool, deadline: Duration) -> Result<(), sqlx::Error> {
        match tokio::time::timeout(deadline, sqlx::query("SELECT 1").execute(pool)).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(sqlx::Error::PoolTimedOut),
        }
    }

    /// Upsert the instance record. Callers must not hold the pool-map lock.
    fn record_status(
        &self,
        config: &InstanceConfig,
        status: InstanceStatus,
        error_message: Option<String>,
    ) {
        let last_seen =
            (status == InstanceStatus::Connected).then(|| self.clock.epoch_secs());
        let record = InstanceRecord {
            name: config.name.clone(),
            connection_redacted: redact_conn_string(&config.connection),
            status,
            last_seen,
            error_message,
        };
        if let Err(err) = self.store.upsert_instance(&record) {
            warn!(instance = %config.name, error = %err, "failed to persist instance status");
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
