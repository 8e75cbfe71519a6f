// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pgvigil_core::MetricRow;
use tempfile::TempDir;

fn seed_metrics(store: &Store, timestamp: i64, count: usize) {
    let rows: Vec<MetricRow> =
        (0..count).map(|i| MetricRow { name: format!("m{i}"), value: i as f64 }).collect();
    // Chunked so a single statement batch stays reasonable.
    for chunk in rows.chunks(1000) {
        store.insert_metrics("default", timestamp, chunk).unwrap();
    }
}

#[test]
fn prune_runs_in_capped_batches_until_short() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(&dir.path().join("pgvigil.db")).unwrap();

    // 25,000 rows older than the cutoff, 50 newer.
    seed_metrics(&store, 100, 25_000);
    seed_metrics(&store, 1_000, 50);

    let mut batches = Vec::new();
    loop {
        let deleted = store
            .prune_batch("metrics_history", "timestamp", 500, PRUNE_BATCH_SIZE)
            .unwrap();
        batches.push(deleted);
        if deleted < PRUNE_BATCH_SIZE {
            break;
        }
    }

    assert_eq!(batches, vec![10_000, 10_000, 5_000]);
    assert_eq!(store.count_rows("metrics_history").unwrap(), 50);

    // After a sweep no row older than the cutoff survives.
    let conn = rusqlite::Connection::open(store.path()).unwrap();
    let stale: i64 = conn
        .query_row("SELECT COUNT(*) FROM metrics_history WHERE timestamp < 500", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(stale, 0);
}

#[test]
fn prune_on_empty_table_is_a_short_batch() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(&dir.path().join("pgvigil.db")).unwrap();
    let deleted =
        store.prune_batch("activity_snapshots", "timestamp", 500, PRUNE_BATCH_SIZE).unwrap();
    assert_eq!(deleted, 0);
}

#[test]
fn prune_rejects_unknown_timestamp_column() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(&dir.path().join("pgvigil.db")).unwrap();
    assert!(matches!(
        store.prune_batch("metrics_history", "value", 500, PRUNE_BATCH_SIZE),
        Err(StoreError::UnknownTable(_))
    ));
}

#[test]
fn query_stats_prune_by_last_seen() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(&dir.path().join("pgvigil.db")).unwrap();

    store
        .upsert_query_stats(
            "default",
            100,
            &[pgvigil_core::QueryStatRow {
                fingerprint: "old".to_string(),
                query: "SELECT 1".to_string(),
                ..Default::default()
            }],
        )
        .unwrap();
    store
        .upsert_query_stats(
            "default",
            900,
            &[pgvigil_core::QueryStatRow {
                fingerprint: "fresh".to_string(),
                query: "SELECT 2".to_string(),
                ..Default::default()
            }],
        )
        .unwrap();

    let deleted = store.prune_batch("query_stats", "last_seen", 500, PRUNE_BATCH_SIZE).unwrap();
    assert_eq!(deleted, 1);
    let stats = store.query_stats("default").unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].fingerprint, "fresh");
}
