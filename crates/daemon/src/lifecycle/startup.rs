// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pgvigil_core::{AgentStatusRecord, Clock, Config, SystemClock};
use pgvigil_engine::{AlertEngine, MetricRegistry, WebhookConfig, WebhookNotifier};
use pgvigil_storage::{ensure_integrity, IntegrityOutcome, Store};

use crate::alerts::{AlertLoop, StoreSink};
use crate::collectors::{
    ActivityCollector, LockCollector, MetricsCollector, QueryStatsCollector,
    ReplicationCollector,
};
use crate::pool::{PoolManager, HEALTH_CHECK_INTERVAL};
use crate::retention::{policy_from, RetentionSweeper};
use crate::scheduler::CollectorScheduler;
use crate::{disk, env, pidfile};

use super::{Daemon, LifecycleError, Paths};

/// Start the daemon. Returns on the first fatal error; per-instance
/// connection failures are recoverable as long as one instance connects.
pub async fn startup(config: &Config) -> Result<Daemon, LifecycleError> {
    let paths = Paths::resolve(config)?;

    // 1. Data directory.
    std::fs::create_dir_all(&paths.data_dir)?;

    // 2. Free-space probe; a full disk is a warning here, never fatal.
    disk::warn_if_low(&paths.data_dir);

    // 3. Integrity probe; a corrupt file is quarantined and recreated.
    match ensure_integrity(&paths.db_path)? {
        IntegrityOutcome::Quarantined(quarantined) => {
            warn!(
                quarantined = %quarantined.display(),
                "database was corrupt; starting with a fresh file"
            );
        }
        IntegrityOutcome::Missing | IntegrityOutcome::Ok => {}
    }

    // 4-5. Open the store (WAL + busy timeout) and run the schema gate.
    let store = Store::open(&paths.db_path)?;

    // 6. Pid file with stale detection. A live holder is fatal.
    pidfile::acquire(&paths.pid_path)?;

    match startup_inner(config, paths.clone(), store.clone()).await {
        Ok(daemon) => Ok(daemon),
        Err(err) => {
            // The liveness markers belong to us by now; don't leave them
            // behind to be mistaken for a crash.
            let _ = store.delete_agent_status();
            pidfile::release(&paths.pid_path);
            Err(err)
        }
    }
}

async fn startup_inner(
    config: &Config,
    paths: Paths,
    store: Store,
) -> Result<Daemon, LifecycleError> {
    let clock = SystemClock;
    let cancel = CancellationToken::new();

    // 7. Agent status singleton: liveness marker for external readers.
    store.upsert_agent_status(&AgentStatusRecord {
        pid: std::process::id() as i32,
        start_time: clock.epoch_secs(),
        last_collect: None,
        version: env::AGENT_VERSION.to_string(),
        config_hash: config.agent_hash()?,
        error_count: 0,
        last_error: None,
    })?;

    // 8. Connection pools; fatal only when every instance fails.
    let pools = Arc::new(PoolManager::new(store.clone(), &config.agent.instances));
    let connected = pools.connect_all().await?;
    info!(
        connected = connected.len(),
        configured = config.agent.instances.len(),
        "instance pools ready"
    );

    let mut tasks = Vec::new();

    // 9. Health-check loop.
    tasks.push(pools.start_health_check(HEALTH_CHECK_INTERVAL, cancel.clone()));

    // 10. One full collector set per connected instance. Only the default
    // instance feeds the alert engine's metric registry.
    let registry = Arc::new(MetricRegistry::new());
    let default_instance = if connected.iter().any(|name| name == "default") {
        Some("default".to_string())
    } else {
        connected.first().cloned()
    };

    let intervals = &config.agent.intervals;
    let mut scheduler = CollectorScheduler::new(store.clone());
    for name in &connected {
        let publish =
            (Some(name) == default_instance.as_ref()).then(|| Arc::clone(&registry));
        scheduler.register(Arc::new(ActivityCollector::new(
            name.clone(),
            intervals.activity,
            Arc::clone(&pools),
            store.clone(),
            publish.clone(),
        )));
        scheduler.register(Arc::new(LockCollector::new(
            name.clone(),
            intervals.locks,
            Arc::clone(&pools),
            store.clone(),
        )));
        scheduler.register(Arc::new(QueryStatsCollector::new(
            name.clone(),
            intervals.queries,
            Arc::clone(&pools),
            store.clone(),
        )));
        scheduler.register(Arc::new(ReplicationCollector::new(
            name.clone(),
            intervals.replication,
            Arc::clone(&pools),
            store.clone(),
            publish.clone(),
        )));
        scheduler.register(Arc::new(MetricsCollector::new(
            name.clone(),
            intervals.metrics,
            Arc::clone(&pools),
            store.clone(),
            publish,
        )));
    }
    scheduler.start(&cancel);

    // 11. Retention sweeper: immediate sweep, then hourly.
    let sweeper =
        RetentionSweeper::new(store.clone(), policy_from(&config.agent.retention));
    tasks.push(tokio::spawn(sweeper.run(cancel.clone())));

    // 12. Alerting, when enabled.
    if config.agent.alerts.enabled {
        let url = config.agent.alerts.webhook_url.clone().unwrap_or_default();
        let (notifier, webhook_task) =
            WebhookNotifier::start(WebhookConfig::new(url), cancel.clone());
        tasks.push(webhook_task);

        let engine =
            Arc::new(AlertEngine::new(clock).with_sink(Arc::new(StoreSink::new(store.clone()))));
        engine.load_rules(&config.alerts.rules);

        let alert_loop =
            AlertLoop::new(engine, Arc::clone(&registry), notifier, default_instance.clone());
        tasks.push(tokio::spawn(alert_loop.run(cancel.clone())));
    }

    info!("daemon started");
    Ok(Daemon { paths, store, pools, scheduler, tasks, cancel })
}
