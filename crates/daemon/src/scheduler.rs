// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collector scheduler: one worker task per registered collector.
//!
//! Every worker takes an immediate first sample, then ticks on its own
//! interval until the root token cancels. There is no ordering between
//! collectors; `last_collect` on the agent status reflects the most recent
//! success of any of them.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pgvigil_core::{Clock, SystemClock};
use pgvigil_storage::Store;

use crate::collectors::Collector;

/// Failure messages that mean the embedded store's disk filled up. These
/// are expected and transient once space is freed, so they log a warning
/// and skip the error-count increment for that tick.
const STORAGE_FULL_PATTERNS: &[&str] =
    &["database or disk is full", "disk is full", "database is full", "no space left"];

pub fn is_storage_full(message: &str) -> bool {
    STORAGE_FULL_PATTERNS.iter().any(|pattern| message.contains(pattern))
}

pub struct CollectorScheduler {
    store: Store,
    collectors: Vec<Arc<dyn Collector>>,
    workers: Vec<JoinHandle<()>>,
}

impl CollectorScheduler {
    pub fn new(store: Store) -> Self {
        Self { store, collectors: Vec::new(), workers: Vec::new() }
    }

    pub fn register(&mut self, collector: Arc<dyn Collector>) {
        self.collectors.push(collector);
    }

    pub fn collector_count(&self) -> usize {
        self.collectors.len()
    }

    /// Launch one independent worker per collector.
    pub fn start(&mut self, cancel: &CancellationToken) {
        for collector in &self.collectors {
            self.workers.push(tokio::spawn(run_collector(
                Arc::clone(collector),
                self.store.clone(),
                cancel.clone(),
            )));
        }
        info!(workers = self.workers.len(), "collector scheduler started");
    }

    /// Wait for all workers to finish. The root token must already be
    /// cancelled; this only joins.
    pub async fn stop(&mut self) {
        for worker in self.workers.drain(..) {
            let _ = worker.await;
        }
        debug!("collector scheduler stopped");
    }
}

async fn run_collector(collector: Arc<dyn Collector>, store: Store, cancel: CancellationToken) {
    debug!(collector = %collector.label(), "collector started");

    // Initial sample before the first tick.
    run_once(collector.as_ref(), &store, &cancel).await;

    let interval = collector.interval();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => run_once(collector.as_ref(), &store, &cancel).await,
        }
    }

    debug!(collector = %collector.label(), "collector stopped");
}

async fn run_once(collector: &dyn Collector, store: &Store, cancel: &CancellationToken) {
    match collector.collect(cancel).await {
        Ok(()) => {
            if let Err(err) = store.touch_last_collect(SystemClock.epoch_secs()) {
                debug!(error = %err, "failed to update last_collect");
            }
        }
        Err(err) => {
            let message = format!("{}: {}", collector.label(), err);
            if is_storage_full(&message) {
                warn!(collector = %collector.label(), "embedded store is full; sample dropped");
                return;
            }
            warn!(collector = %collector.label(), error = %err, "collect failed");
            if let Err(store_err) = store.record_agent_error(&message) {
                debug!(error = %store_err, "failed to record collector error");
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
