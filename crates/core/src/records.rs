// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared record types exchanged between the daemon components and the
//! embedded store. Persisted timestamps are unix epoch seconds.

use serde::{Deserialize, Serialize};

/// Connection state of one monitored instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Unknown,
    Connected,
    Disconnected,
    Error,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Unknown => "unknown",
            InstanceStatus::Connected => "connected",
            InstanceStatus::Disconnected => "disconnected",
            InstanceStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unknown" => Some(InstanceStatus::Unknown),
            "connected" => Some(InstanceStatus::Connected),
            "disconnected" => Some(InstanceStatus::Disconnected),
            "error" => Some(InstanceStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent row for one monitored instance (`agent_instances`).
///
/// `last_seen` is set iff the status is connected.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRecord {
    pub name: String,
    pub connection_redacted: String,
    pub status: InstanceStatus,
    pub last_seen: Option<i64>,
    pub error_message: Option<String>,
}

/// Persistent singleton (`agent_status`, id = 1). Its presence plus a live
/// pid is the daemon liveness signal; it is deleted on clean shutdown.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentStatusRecord {
    pub pid: i32,
    pub start_time: i64,
    pub last_collect: Option<i64>,
    pub version: String,
    pub config_hash: String,
    pub error_count: i64,
    pub last_error: Option<String>,
}

/// One `pg_stat_activity` session sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityRow {
    pub pid: i32,
    pub usename: Option<String>,
    pub datname: Option<String>,
    pub state: Option<String>,
    pub wait_event: Option<String>,
    pub query_start: Option<i64>,
    pub xact_start: Option<i64>,
    pub query: Option<String>,
}

/// One `pg_locks` sample joined against the owning session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LockRow {
    pub pid: i32,
    pub locktype: String,
    pub mode: String,
    pub granted: bool,
    pub relation: Option<String>,
    pub blocking_pids: Vec<i32>,
}

/// One `pg_stat_replication` standby sample; lags in bytes behind the
/// primary's current WAL insert position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplicationLagRow {
    pub client_addr: Option<String>,
    pub state: Option<String>,
    pub sent_lag_bytes: i64,
    pub write_lag_bytes: i64,
    pub flush_lag_bytes: i64,
    pub replay_lag_bytes: i64,
}

/// One named metric sample (`metrics_history`).
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub name: String,
    pub value: f64,
}

/// Aggregated statistics for one normalized query (`query_stats`).
/// Keyed by `(fingerprint, instance_name)`; `last_seen` advances on upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryStatRow {
    pub fingerprint: String,
    pub query: String,
    pub calls: i64,
    pub total_ms: f64,
    pub mean_ms: f64,
    pub rows: i64,
}

/// A reconstructed deadlock with its participant processes. Produced by the
/// external log-tail collaborator; the store only persists it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeadlockEvent {
    pub detected_at: i64,
    pub processes: Vec<DeadlockProcess>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeadlockProcess {
    pub pid: i32,
    pub query: Option<String>,
}

/// Append-only alert transition row (`alert_events`).
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEventRecord {
    pub id: i64,
    pub rule_name: String,
    pub prev_state: String,
    pub new_state: String,
    pub metric_value: f64,
    pub threshold_value: f64,
    pub triggered_at: i64,
    pub acknowledged_at: Option<i64>,
    pub acknowledged_by: Option<String>,
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;
