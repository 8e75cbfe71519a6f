// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration: TOML model, bounds validation, config hash.
//!
//! Durations are written as strings ("10s", "24h") and parsed with
//! [`parse_duration`]. Validation errors name the offending key so a bad
//! config is diagnosable from the startup log alone.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::conninfo::is_valid_instance_name;

/// Collector intervals must fall within this range.
pub const INTERVAL_MIN: Duration = Duration::from_secs(1);
pub const INTERVAL_MAX: Duration = Duration::from_secs(60);

/// Retention windows must fall within this range.
pub const RETENTION_MIN: Duration = Duration::from_secs(60 * 60);
pub const RETENTION_MAX: Duration = Duration::from_secs(720 * 60 * 60);

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub alerts: AlertRuleSection,
}

/// `[agent]` section: everything the daemon itself consumes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Gates all daemon features.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Data directory override; platform default when absent.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub intervals: Intervals,
    #[serde(default)]
    pub retention: Retention,
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_dir: None,
            intervals: Intervals::default(),
            retention: Retention::default(),
            instances: Vec::new(),
            alerts: AlertsConfig::default(),
        }
    }
}

/// Per-collector sample intervals, each bounded [1s, 60s].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Intervals {
    #[serde(default = "d_10s", with = "duration_str")]
    pub activity: Duration,
    #[serde(default = "d_30s", with = "duration_str")]
    pub queries: Duration,
    #[serde(default = "d_10s", with = "duration_str")]
    pub replication: Duration,
    #[serde(default = "d_10s", with = "duration_str")]
    pub locks: Duration,
    /// Accepted and bounds-checked; reserved for the table-stats collector.
    #[serde(default = "d_60s", with = "duration_str")]
    pub tables: Duration,
    #[serde(default = "d_10s", with = "duration_str")]
    pub metrics: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            activity: d_10s(),
            queries: d_30s(),
            replication: d_10s(),
            locks: d_10s(),
            tables: d_60s(),
            metrics: d_10s(),
        }
    }
}

/// Per-table retention windows, each bounded [1h, 720h].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Retention {
    #[serde(default = "d_24h", with = "duration_str")]
    pub activity_history: Duration,
    #[serde(default = "d_168h", with = "duration_str")]
    pub query_stats: Duration,
    #[serde(default = "d_72h", with = "duration_str")]
    pub replication_lag: Duration,
    #[serde(default = "d_24h", with = "duration_str")]
    pub lock_history: Duration,
    #[serde(default = "d_168h", with = "duration_str")]
    pub metrics: Duration,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            activity_history: d_24h(),
            query_stats: d_168h(),
            replication_lag: d_72h(),
            lock_history: d_24h(),
            metrics: d_168h(),
        }
    }
}

/// One monitored PostgreSQL instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstanceConfig {
    pub name: String,
    pub connection: String,
}

/// `[agent.alerts]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// `[[alerts.rules]]` container.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AlertRuleSection {
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// One threshold rule as written in the config file.
///
/// Structural validation (name shape, operator, threshold ordering) happens
/// when the alert engine loads the rule; an invalid rule is skipped there
/// without failing the rest of the set.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    pub name: String,
    pub metric: String,
    pub operator: String,
    pub warning: f64,
    pub critical: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Configuration errors; all fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("agent.intervals.{field} must be between 1s and 60s (got {got:?})")]
    IntervalOutOfRange { field: &'static str, got: Duration },

    #[error("agent.retention.{field} must be between 1h and 720h (got {got:?})")]
    RetentionOutOfRange { field: &'static str, got: Duration },

    #[error("agent.instances: invalid instance name {0:?}")]
    InvalidInstanceName(String),

    #[error("agent.instances: duplicate instance name {0:?}")]
    DuplicateInstance(String),

    #[error("agent.instances.{0}: connection string is empty")]
    MissingConnection(String),

    #[error("agent.instances is empty but the agent is enabled")]
    NoInstances,

    #[error("agent.alerts.webhook_url is required when alerts are enabled")]
    WebhookUrlRequired,

    #[error("failed to serialize config for hashing: {0}")]
    Hash(#[from] serde_json::Error),
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate bounds and structural invariants. Rule-level invariants are
    /// checked at engine load instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let iv = &self.agent.intervals;
        check_interval("activity", iv.activity)?;
        check_interval("queries", iv.queries)?;
        check_interval("replication", iv.replication)?;
        check_interval("locks", iv.locks)?;
        check_interval("tables", iv.tables)?;
        check_interval("metrics", iv.metrics)?;

        let rt = &self.agent.retention;
        check_retention("activity_history", rt.activity_history)?;
        check_retention("query_stats", rt.query_stats)?;
        check_retention("replication_lag", rt.replication_lag)?;
        check_retention("lock_history", rt.lock_history)?;
        check_retention("metrics", rt.metrics)?;

        let mut seen = HashSet::new();
        for instance in &self.agent.instances {
            if !is_valid_instance_name(&instance.name) {
                return Err(ConfigError::InvalidInstanceName(instance.name.clone()));
            }
            if !seen.insert(instance.name.as_str()) {
                return Err(ConfigError::DuplicateInstance(instance.name.clone()));
            }
            if instance.connection.trim().is_empty() {
                return Err(ConfigError::MissingConnection(instance.name.clone()));
            }
        }

        if self.agent.enabled && self.agent.instances.is_empty() {
            return Err(ConfigError::NoInstances);
        }

        if self.agent.alerts.enabled
            && self.agent.alerts.webhook_url.as_deref().unwrap_or("").trim().is_empty()
        {
            return Err(ConfigError::WebhookUrlRequired);
        }

        Ok(())
    }

    /// Deterministic digest over the `[agent]` section, recorded on the agent
    /// status row so external readers can detect config drift. SHA-256 over
    /// the canonical JSON serialization; stable across restarts for the same
    /// configuration.
    pub fn agent_hash(&self) -> Result<String, ConfigError> {
        let canonical = serde_json::to_vec(&self.agent)?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        let digest = hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            out.push_str(&format!("{:02x}", byte));
        }
        Ok(out)
    }
}

fn check_interval(field: &'static str, got: Duration) -> Result<(), ConfigError> {
    if got < INTERVAL_MIN || got > INTERVAL_MAX {
        return Err(ConfigError::IntervalOutOfRange { field, got });
    }
    Ok(())
}

fn check_retention(field: &'static str, got: Duration) -> Result<(), ConfigError> {
    if got < RETENTION_MIN || got > RETENTION_MAX {
        return Err(ConfigError::RetentionOutOfRange { field, got });
    }
    Ok(())
}

/// Parse a duration string like "500ms", "30s", "5m", "1h", "7d".
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the numeric prefix
    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));

    let num: u64 = num_str.parse().map_err(|_| format!("invalid number in duration: {}", s))?;

    let multiplier = match suffix.trim() {
        "ms" | "millis" | "millisecond" | "milliseconds" => {
            return Ok(Duration::from_millis(num));
        }
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => 86400,
        other => return Err(format!("unknown duration suffix: {}", other)),
    };

    Ok(Duration::from_secs(num * multiplier))
}

/// Canonical rendering for [`parse_duration`] strings; used when a config is
/// re-serialized (including the hash canonicalization).
pub fn format_duration(d: &Duration) -> String {
    let ms = d.as_millis();
    if ms % 1000 != 0 {
        return format!("{}ms", ms);
    }
    let secs = d.as_secs();
    if secs % 3600 == 0 && secs != 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 && secs != 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

mod duration_str {
    use super::{format_duration, parse_duration};
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(de::Error::custom)
    }

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(value))
    }
}

fn default_true() -> bool {
    true
}

fn d_10s() -> Duration {
    Duration::from_secs(10)
}

fn d_30s() -> Duration {
    Duration::from_secs(30)
}

fn d_60s() -> Duration {
    Duration::from_secs(60)
}

fn d_24h() -> Duration {
    Duration::from_secs(24 * 3600)
}

fn d_72h() -> Duration {
    Duration::from_secs(72 * 3600)
}

fn d_168h() -> Duration {
    Duration::from_secs(168 * 3600)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
