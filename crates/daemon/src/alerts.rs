// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert loop wiring: periodic evaluation against the metric registry,
//! store-backed event persistence, and webhook fan-out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use pgvigil_core::{Clock, SystemClock};
use pgvigil_engine::engine::EVAL_INTERVAL;
use pgvigil_engine::{
    AgentBody, AlertEngine, EventSink, MetricRegistry, StateChange, WebhookNotifier,
    WebhookPayload,
};
use pgvigil_storage::Store;

use crate::env;

/// [`EventSink`] over the embedded store. Writes are bounded by the
/// store's busy timeout.
pub struct StoreSink {
    store: Store,
}

impl StoreSink {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

impl EventSink for StoreSink {
    fn save_event(&self, change: &StateChange) -> Result<(), String> {
        self.store
            .insert_alert_event(
                &change.rule_name,
                change.prev_state.as_str(),
                change.new_state.as_str(),
                change.metric_value,
                change.threshold,
                change.triggered_at.timestamp(),
            )
            .map(|_| ())
            .map_err(|err| err.to_string())
    }

    fn acknowledge_event(
        &self,
        rule_name: &str,
        acknowledged_by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), String> {
        self.store
            .acknowledge_alert_event(rule_name, acknowledged_by, at.timestamp())
            .map_err(|err| err.to_string())
    }
}

/// The 5 s evaluation loop.
pub struct AlertLoop {
    engine: Arc<AlertEngine<SystemClock>>,
    registry: Arc<MetricRegistry>,
    notifier: WebhookNotifier,
    /// Instance reported in outbound payloads (the registry's source).
    instance: Option<String>,
    clock: SystemClock,
}

impl AlertLoop {
    pub fn new(
        engine: Arc<AlertEngine<SystemClock>>,
        registry: Arc<MetricRegistry>,
        notifier: WebhookNotifier,
        instance: Option<String>,
    ) -> Self {
        Self { engine, registry, notifier, instance, clock: SystemClock }
    }

    fn agent_body(&self) -> AgentBody {
        AgentBody {
            version: env::AGENT_VERSION.to_string(),
            hostname: env::hostname(),
            instance: self.instance.clone(),
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + EVAL_INTERVAL,
            EVAL_INTERVAL,
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.evaluate(),
            }
        }
        debug!("alert loop stopped");
    }

    fn evaluate(&self) {
        let changes = self.engine.evaluate_cycle(self.registry.as_ref());
        for change in changes {
            debug!(
                rule = %change.rule_name,
                prev = %change.prev_state,
                new = %change.new_state,
                value = change.metric_value,
                "alert state change"
            );
            let payload =
                WebhookPayload::from_change(&change, self.clock.now_utc(), self.agent_body());
            self.notifier.send_async(payload);
        }
    }
}

#[cfg(test)]
#[path = "alerts_tests.rs"]
mod tests;
