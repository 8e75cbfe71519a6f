// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-rule severity state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rule::AlertRule;

/// Alert severity. Warning and critical count as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Severity::Normal),
            "warning" => Some(Severity::Warning),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Severity::Normal)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live evaluation state for one loaded rule.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertState {
    pub rule_name: String,
    pub current_state: Severity,
    pub previous_state: Severity,
    pub metric_value: f64,
    /// Threshold that produced the current state: critical when critical,
    /// warning when warning, 0 when normal.
    pub threshold: f64,
    /// Advances only on state change.
    pub triggered_at: DateTime<Utc>,
    pub last_evaluated: DateTime<Utc>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl AlertState {
    pub fn new(rule_name: &str, at: DateTime<Utc>) -> Self {
        Self {
            rule_name: rule_name.to_string(),
            current_state: Severity::Normal,
            previous_state: Severity::Normal,
            metric_value: 0.0,
            threshold: 0.0,
            triggered_at: at,
            last_evaluated: at,
            acknowledged: false,
            acknowledged_at: None,
        }
    }
}

/// One emitted transition, carrying everything the webhook surface needs.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub rule_name: String,
    pub metric: String,
    pub prev_state: Severity,
    pub new_state: Severity,
    pub metric_value: f64,
    pub threshold: f64,
    pub warning: f64,
    pub critical: f64,
    pub triggered_at: DateTime<Utc>,
    pub message_template: Option<String>,
}

impl StateChange {
    /// A transition back to normal resolves the alert.
    pub fn is_resolution(&self) -> bool {
        self.new_state == Severity::Normal
    }
}

/// Severity for a value under a rule: the critical threshold is checked
/// first, then warning. Returns the severity and the threshold that
/// produced it (0 for normal).
pub fn severity_for(rule: &AlertRule, value: f64) -> (Severity, f64) {
    if rule.operator.compare(value, rule.critical) {
        (Severity::Critical, rule.critical)
    } else if rule.operator.compare(value, rule.warning) {
        (Severity::Warning, rule.warning)
    } else {
        (Severity::Normal, 0.0)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
