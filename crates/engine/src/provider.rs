// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metric provider port.
//!
//! The engine never depends on a particular collector: identifiers in rule
//! expressions resolve through this narrow abstraction, and the daemon's
//! metrics collector publishes into a [`MetricRegistry`] behind it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Well-known metric names published by the metrics collector.
pub mod names {
    pub const ACTIVE_CONNECTIONS: &str = "active_connections";
    pub const MAX_CONNECTIONS: &str = "max_connections";
    /// 0–1 ratio; see also [`CACHE_HIT_RATIO_PCT`].
    pub const CACHE_HIT_RATIO: &str = "cache_hit_ratio";
    /// 0–100 percentage form of [`CACHE_HIT_RATIO`].
    pub const CACHE_HIT_RATIO_PCT: &str = "cache_hit_ratio_pct";
    pub const TPS: &str = "tps";
    pub const DATABASE_SIZE: &str = "database_size";
    pub const REPLICATION_LAG_BYTES: &str = "replication_lag_bytes";
    pub const LONGEST_TRANSACTION_SECONDS: &str = "longest_transaction_seconds";
    pub const IDLE_IN_TRANSACTION_SECONDS: &str = "idle_in_transaction_seconds";
}

/// Resolve metric-name aliases to their canonical form.
pub fn canonical_metric_name(name: &str) -> &str {
    match name {
        "connection_count" => names::ACTIVE_CONNECTIONS,
        other => other,
    }
}

/// Read side of the metric stream.
pub trait MetricSource: Send + Sync {
    /// Current value for a metric name, if the provider has one.
    fn get(&self, name: &str) -> Option<f64>;
    /// When the provider's values were last refreshed.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Shared registry the metrics collector refreshes each cycle.
#[derive(Default)]
pub struct MetricRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    values: HashMap<String, f64>,
    updated_at: Option<DateTime<Utc>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole value set atomically.
    pub fn publish(&self, values: HashMap<String, f64>, at: DateTime<Utc>) {
        let mut inner = self.inner.write();
        inner.values = values;
        inner.updated_at = Some(at);
    }

    /// Merge a single value without touching the rest.
    pub fn set(&self, name: &str, value: f64, at: DateTime<Utc>) {
        let mut inner = self.inner.write();
        inner.values.insert(name.to_string(), value);
        inner.updated_at = Some(at);
    }
}

impl MetricSource for MetricRegistry {
    fn get(&self, name: &str) -> Option<f64> {
        self.inner.read().values.get(canonical_metric_name(name)).copied()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.inner.read().updated_at.unwrap_or_default()
    }
}

/// Fixed-value provider for tests and one-shot evaluations.
pub struct StaticMetrics {
    values: HashMap<String, f64>,
    at: DateTime<Utc>,
}

impl StaticMetrics {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(|(name, value)| (name.into(), value)).collect(),
            at: Utc::now(),
        }
    }
}

impl MetricSource for StaticMetrics {
    fn get(&self, name: &str) -> Option<f64> {
        self.values.get(canonical_metric_name(name)).copied()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.at
    }
}
