// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The alert evaluation engine.
//!
//! Rules, states, and parsed expressions live behind one mutex. The lock is
//! held across a full evaluation cycle (transitions for a rule are strictly
//! ordered) but always released before persistence runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use pgvigil_core::{Clock, RuleConfig};

use crate::provider::MetricSource;
use crate::rule::AlertRule;
use crate::state::{severity_for, AlertState, StateChange};

/// Default evaluation cadence.
pub const EVAL_INTERVAL: Duration = Duration::from_secs(5);

/// Persistence port for alert events. The store-side implementation bounds
/// each write with the database's 5 s busy timeout.
pub trait EventSink: Send + Sync {
    fn save_event(&self, change: &StateChange) -> Result<(), String>;
    fn acknowledge_event(
        &self,
        rule_name: &str,
        acknowledged_by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), String>;
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown alert rule {0:?}")]
    UnknownRule(String),

    #[error("alert {0:?} is not active")]
    NotActive(String),

    #[error("alert {0:?} is already acknowledged")]
    AlreadyAcknowledged(String),

    #[error("failed to persist acknowledgment: {0}")]
    Sink(String),
}

pub struct AlertEngine<C: Clock> {
    clock: C,
    sink: Option<Arc<dyn EventSink>>,
    inner: Mutex<EngineInner>,
}

#[derive(Default)]
struct EngineInner {
    rules: Vec<AlertRule>,
    states: HashMap<String, AlertState>,
}

impl<C: Clock> AlertEngine<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, sink: None, inner: Mutex::new(EngineInner::default()) }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Load a rule set, replacing any previous one. Invalid rules are logged
    /// and skipped; they never block the rest. Returns the number loaded.
    /// Loading the same set twice produces identical rule and state maps.
    pub fn load_rules(&self, configs: &[RuleConfig]) -> usize {
        let now = self.clock.now_utc();
        let mut rules = Vec::new();
        let mut states = HashMap::new();

        for config in configs {
            match AlertRule::from_config(config) {
                Ok(rule) => {
                    states.insert(rule.name.clone(), AlertState::new(&rule.name, now));
                    rules.push(rule);
                }
                Err(err) => {
                    warn!(rule = %config.name, error = %err, "skipping invalid alert rule");
                }
            }
        }

        let loaded = rules.len();
        info!(loaded, skipped = configs.len() - loaded, "alert rules loaded");
        *self.inner.lock() = EngineInner { rules, states };
        loaded
    }

    /// Run one evaluation cycle and return the state changes it produced.
    pub fn evaluate_cycle(&self, source: &dyn MetricSource) -> Vec<StateChange> {
        let now = self.clock.now_utc();
        let mut changes = Vec::new();

        {
            let mut inner = self.inner.lock();
            let EngineInner { rules, states } = &mut *inner;

            for rule in rules.iter().filter(|rule| rule.enabled) {
                let value = match rule.expr.eval(source) {
                    Ok(value) => value,
                    Err(err) => {
                        debug!(rule = %rule.name, error = %err, "alert evaluation skipped");
                        continue;
                    }
                };

                let Some(state) = states.get_mut(&rule.name) else {
                    continue;
                };
                state.last_evaluated = now;
                state.metric_value = value;

                let (new_state, threshold) = severity_for(rule, value);
                if new_state == state.current_state {
                    continue;
                }

                state.previous_state = state.current_state;
                state.current_state = new_state;
                state.threshold = threshold;
                state.triggered_at = now;
                if new_state.is_active() && !state.previous_state.is_active() {
                    state.acknowledged = false;
                    state.acknowledged_at = None;
                }

                changes.push(StateChange {
                    rule_name: rule.name.clone(),
                    metric: rule.metric.clone(),
                    prev_state: state.previous_state,
                    new_state,
                    metric_value: value,
                    threshold,
                    warning: rule.warning,
                    critical: rule.critical,
                    triggered_at: now,
                    message_template: rule.message.clone(),
                });
            }
        }

        if let Some(sink) = &self.sink {
            for change in &changes {
                if let Err(err) = sink.save_event(change) {
                    warn!(rule = %change.rule_name, error = %err, "failed to persist alert event");
                }
            }
        }

        changes
    }

    /// Acknowledge an active, not-yet-acknowledged alert.
    pub fn acknowledge(&self, rule_name: &str, acknowledged_by: &str) -> Result<(), EngineError> {
        let now = self.clock.now_utc();

        {
            let mut inner = self.inner.lock();
            let state = inner
                .states
                .get_mut(rule_name)
                .ok_or_else(|| EngineError::UnknownRule(rule_name.to_string()))?;
            if !state.current_state.is_active() {
                return Err(EngineError::NotActive(rule_name.to_string()));
            }
            if state.acknowledged {
                return Err(EngineError::AlreadyAcknowledged(rule_name.to_string()));
            }
            state.acknowledged = true;
            state.acknowledged_at = Some(now);
        }

        if let Some(sink) = &self.sink {
            sink.acknowledge_event(rule_name, acknowledged_by, now).map_err(EngineError::Sink)?;
        }
        Ok(())
    }

    /// Snapshot of all rule states, ordered by rule name.
    pub fn states(&self) -> Vec<AlertState> {
        let inner = self.inner.lock();
        let mut states: Vec<AlertState> = inner.states.values().cloned().collect();
        states.sort_by(|a, b| a.rule_name.cmp(&b.rule_name));
        states
    }

    pub fn rule_count(&self) -> usize {
        self.inner.lock().rules.len()
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
