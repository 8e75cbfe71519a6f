// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::store::Store;
use tempfile::TempDir;

#[test]
fn missing_file_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let outcome = ensure_integrity(&dir.path().join("pgvigil.db")).unwrap();
    assert_eq!(outcome, IntegrityOutcome::Missing);
}

#[test]
fn healthy_file_passes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pgvigil.db");
    drop(Store::open(&path).unwrap());
    assert_eq!(ensure_integrity(&path).unwrap(), IntegrityOutcome::Ok);
}

#[test]
fn corrupt_file_is_quarantined_and_replaced() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pgvigil.db");

    // Leave WAL sidecars behind to verify they get cleaned up too.
    std::fs::write(&path, b"definitely not a sqlite database").unwrap();
    let wal = dir.path().join("pgvigil.db-wal");
    let shm = dir.path().join("pgvigil.db-shm");
    std::fs::write(&wal, b"stale wal").unwrap();
    std::fs::write(&shm, b"stale shm").unwrap();

    let outcome = ensure_integrity(&path).unwrap();
    let quarantined = match outcome {
        IntegrityOutcome::Quarantined(q) => q,
        other => panic!("expected quarantine, got {other:?}"),
    };

    assert!(!path.exists());
    assert!(quarantined.exists());
    assert!(quarantined
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("pgvigil.db.corrupt-")));
    assert!(!wal.exists());
    assert!(!shm.exists());

    // A fresh database can now be created in place.
    let store = Store::open(&path).unwrap();
    assert_eq!(store.count_rows("agent_status").unwrap(), 0);
}
