// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collectors sample one data kind from one instance at a fixed interval.
//!
//! Five kinds per connected instance: activity, locks, queries,
//! replication, metrics. Each is registered with the scheduler and runs on
//! its own clock; pools are looked up through the manager on every cycle so
//! a reconnected instance is picked up transparently.

mod activity;
mod locks;
mod metrics;
mod queries;
mod replication;

pub use activity::ActivityCollector;
pub use locks::LockCollector;
pub use metrics::MetricsCollector;
pub use queries::QueryStatsCollector;
pub use replication::ReplicationCollector;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::pool::PoolManager;

/// Deadline for one collector's query batch.
pub(crate) const QUERY_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("store write failed: {0}")]
    Store(#[from] pgvigil_storage::StoreError),

    #[error("instance pool unavailable")]
    PoolUnavailable,

    #[error("query deadline exceeded")]
    Timeout,

    #[error("{0}")]
    Message(String),
}

/// One scheduled sampling entity.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Data kind, e.g. "activity".
    fn name(&self) -> &str;
    /// Monitored instance this collector samples.
    fn instance(&self) -> &str;
    fn interval(&self) -> Duration;
    async fn collect(&self, cancel: &CancellationToken) -> Result<(), CollectError>;

    /// "kind[instance]" label used in logs and `last_error`.
    fn label(&self) -> String {
        format!("{}[{}]", self.name(), self.instance())
    }
}

/// Resolve the instance's pool through the manager; absence is an error
/// for this cycle, not a terminal condition.
pub(crate) fn pool_for(
    pools: &Arc<PoolManager>,
    instance: &str,
) -> Result<sqlx::PgPool, CollectError> {
    pools.get(instance).ok_or(CollectError::PoolUnavailable)
}

/// Bound a query future with the collector deadline.
pub(crate) async fn bounded<F, T>(future: F) -> Result<T, CollectError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(QUERY_DEADLINE, future).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(CollectError::Timeout),
    }
}
