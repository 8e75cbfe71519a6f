// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pgvigil_core::{Config, InstanceConfig};
use tempfile::TempDir;

fn config_with(data_dir: &std::path::Path, connection: &str) -> Config {
    let mut config = Config::default();
    config.agent.data_dir = Some(data_dir.to_path_buf());
    config.agent.instances =
        vec![InstanceConfig { name: "default".to_string(), connection: connection.to_string() }];
    config
}

#[test]
fn paths_prefer_configured_data_dir() {
    let dir = TempDir::new().unwrap();
    let config = config_with(dir.path(), "postgres://mon@db1/postgres");
    let paths = Paths::resolve(&config).unwrap();
    assert_eq!(paths.data_dir, dir.path());
    assert_eq!(paths.db_path, dir.path().join("pgvigil.db"));
    assert_eq!(paths.pid_path, dir.path().join("pgvigild.pid"));
}

#[test]
fn paths_fall_back_to_platform_default() {
    let config = Config::default();
    // Either a platform dir exists or resolution fails cleanly; both are
    // acceptable on CI, what matters is the file names underneath.
    if let Ok(paths) = Paths::resolve(&config) {
        assert!(paths.db_path.ends_with("pgvigil.db"));
        assert!(paths.pid_path.ends_with("pgvigild.pid"));
    }
}

#[tokio::test]
async fn startup_with_no_connectable_instance_is_fatal_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    let config = config_with(dir.path(), "http://definitely-not-postgres");

    let err = startup(&config).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Pool(PoolError::NoneConnected)));
    assert_eq!(err.exit_code(), 3);

    // Liveness markers must not survive a failed start.
    assert!(!dir.path().join("pgvigild.pid").exists());
    let store = Store::open(&dir.path().join("pgvigil.db")).unwrap();
    assert_eq!(store.agent_status().unwrap(), None);

    // The failed instance is still visible to external readers.
    let instances = store.instances().unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].status, pgvigil_core::InstanceStatus::Error);
}

#[tokio::test]
async fn startup_refuses_second_live_agent() {
    let dir = TempDir::new().unwrap();
    let config = config_with(dir.path(), "http://definitely-not-postgres");

    // Simulate a live holder: our own pid.
    std::fs::write(
        dir.path().join("pgvigild.pid"),
        format!("{}\n", std::process::id()),
    )
    .unwrap();

    let err = startup(&config).await.unwrap_err();
    assert!(matches!(err, LifecycleError::PidFile(PidFileError::AlreadyRunning(_))));
    assert_eq!(err.exit_code(), 2);

    // The existing holder's pid file is untouched.
    let raw = std::fs::read_to_string(dir.path().join("pgvigild.pid")).unwrap();
    assert_eq!(raw.trim().parse::<u32>().unwrap(), std::process::id());
}

#[test]
fn exit_codes_map_error_kinds() {
    let permission =
        LifecycleError::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"));
    assert_eq!(permission.exit_code(), 1);

    let running = LifecycleError::PidFile(PidFileError::AlreadyRunning(42));
    assert_eq!(running.exit_code(), 2);

    assert_eq!(LifecycleError::NoDataDir.exit_code(), 3);
    assert_eq!(LifecycleError::Pool(PoolError::NoneConnected).exit_code(), 3);
}
