// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn store(dir: &TempDir) -> Store {
    Store::open(&dir.path().join("pgvigil.db")).unwrap()
}

fn instance(name: &str, connection: &str) -> InstanceConfig {
    InstanceConfig { name: name.to_string(), connection: connection.to_string() }
}

#[test]
fn build_options_parses_url_components() {
    let options =
        PoolManager::build_options(&instance("default", "postgres://mon@db1:6432/postgres"))
            .unwrap();
    assert_eq!(options.get_host(), "db1");
    assert_eq!(options.get_port(), 6432);
    assert_eq!(options.get_username(), "mon");
}

#[test]
fn build_options_rejects_garbage() {
    let err = PoolManager::build_options(&instance("default", "http://not-postgres"))
        .unwrap_err();
    match err {
        PoolError::Parse { instance, .. } => assert_eq!(instance, "default"),
        other => panic!("expected Parse, got {other}"),
    }
}

#[tokio::test]
async fn connect_with_bad_conn_string_records_error_status() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let manager =
        PoolManager::new(store.clone(), &[instance("default", "http://not-postgres")]);

    assert!(matches!(manager.connect("default").await, Err(PoolError::Parse { .. })));

    let records = store.instances().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, InstanceStatus::Error);
    assert_eq!(records[0].last_seen, None);
    assert!(records[0].error_message.as_deref().unwrap_or("").contains("default"));
}

#[tokio::test]
async fn connect_all_with_no_survivors_is_fatal() {
    let dir = TempDir::new().unwrap();
    let manager = PoolManager::new(
        store(&dir),
        &[instance("a", "http://nope"), instance("b", "also nope://")],
    );
    assert!(matches!(manager.connect_all().await, Err(PoolError::NoneConnected)));
}

#[tokio::test]
async fn lookups_on_unconnected_manager() {
    let dir = TempDir::new().unwrap();
    let manager = PoolManager::new(
        store(&dir),
        &[instance("default", "postgres://mon@db1/postgres")],
    );

    assert!(manager.get("default").is_none(), "no pool before connect");
    assert!(manager.get("missing").is_none());
    assert!(manager.get_default().is_none());
    assert!(matches!(manager.connect("missing").await, Err(PoolError::Unknown(_))));
    assert!(matches!(manager.reconnect("missing").await, Err(PoolError::Unknown(_))));
}

#[tokio::test]
async fn close_clears_all_pools() {
    let dir = TempDir::new().unwrap();
    let manager = PoolManager::new(
        store(&dir),
        &[instance("default", "postgres://mon@db1/postgres")],
    );
    manager.close().await;
    assert!(manager.get("default").is_none());
}
