// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pgvigil_core::{Clock, MetricRow, QueryStatRow};
use tempfile::TempDir;

#[test]
fn policy_maps_every_configured_window() {
    let retention = Retention::default();
    let policy = policy_from(&retention);
    let tables: Vec<&str> = policy.iter().map(|entry| entry.table).collect();
    assert_eq!(
        tables,
        vec![
            "activity_snapshots",
            "lock_snapshots",
            "query_stats",
            "replication_lag_history",
            "metrics_history",
        ]
    );
    let query_stats = policy.iter().find(|entry| entry.table == "query_stats").unwrap();
    assert_eq!(query_stats.ts_column, "last_seen");
    assert_eq!(query_stats.retention, retention.query_stats);
}

#[tokio::test]
async fn sweep_removes_expired_rows_and_keeps_fresh_ones() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(&dir.path().join("pgvigil.db")).unwrap();
    let now = SystemClock.epoch_secs();

    let old = now - 48 * 3600;
    store
        .insert_metrics("default", old, &[MetricRow { name: "tps".to_string(), value: 1.0 }])
        .unwrap();
    store
        .insert_metrics("default", now, &[MetricRow { name: "tps".to_string(), value: 2.0 }])
        .unwrap();
    store
        .upsert_query_stats(
            "default",
            old,
            &[QueryStatRow {
                fingerprint: "stale".to_string(),
                query: "SELECT 1".to_string(),
                ..Default::default()
            }],
        )
        .unwrap();

    let policy = vec![
        PolicyEntry {
            table: "metrics_history",
            ts_column: "timestamp",
            retention: Duration::from_secs(24 * 3600),
        },
        PolicyEntry {
            table: "query_stats",
            ts_column: "last_seen",
            retention: Duration::from_secs(24 * 3600),
        },
    ];

    let sweeper = RetentionSweeper::new(store.clone(), policy);
    sweeper.sweep_once().await;

    assert_eq!(store.count_rows("metrics_history").unwrap(), 1);
    assert_eq!(store.count_rows("query_stats").unwrap(), 0);
}

#[tokio::test]
async fn sweep_on_empty_store_is_quiet() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(&dir.path().join("pgvigil.db")).unwrap();
    let sweeper = RetentionSweeper::new(store, policy_from(&Retention::default()));
    sweeper.sweep_once().await;
}
