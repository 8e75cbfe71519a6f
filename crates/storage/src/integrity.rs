// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pre-open integrity probe and corrupt-database quarantine.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::{info, warn};

use crate::store::StoreError;

/// Result of the pre-open probe.
#[derive(Debug, PartialEq, Eq)]
pub enum IntegrityOutcome {
    /// No database file yet; nothing to check.
    Missing,
    /// File passed `quick_check`.
    Ok,
    /// File failed the probe and was renamed aside; sidecars removed.
    Quarantined(PathBuf),
}

/// Probe an existing database file before opening it for real. A corrupt
/// file is renamed to `<file>.corrupt-<timestamp>` and its `-wal`/`-shm`
/// sidecars are deleted so a fresh database can be created in its place.
pub fn ensure_integrity(path: &Path) -> Result<IntegrityOutcome, StoreError> {
    if !path.exists() {
        return Ok(IntegrityOutcome::Missing);
    }

    match quick_check(path) {
        Ok(()) => Ok(IntegrityOutcome::Ok),
        Err(reason) => {
            warn!(path = %path.display(), %reason, "database failed integrity probe");
            let quarantined = quarantine(path)?;
            info!(quarantined = %quarantined.display(), "corrupt database quarantined");
            Ok(IntegrityOutcome::Quarantined(quarantined))
        }
    }
}

/// `PRAGMA quick_check` on a throwaway connection. Any failure to open or
/// query counts as corruption.
fn quick_check(path: &Path) -> Result<(), String> {
    let conn = Connection::open(path).map_err(|e| e.to_string())?;
    let verdict: String = conn
        .query_row("PRAGMA quick_check", [], |row| row.get(0))
        .map_err(|e| e.to_string())?;
    if verdict == "ok" {
        Ok(())
    } else {
        Err(verdict)
    }
}

fn quarantine(path: &Path) -> Result<PathBuf, StoreError> {
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let mut quarantined = path.as_os_str().to_owned();
    quarantined.push(format!(".corrupt-{stamp}"));
    let quarantined = PathBuf::from(quarantined);
    std::fs::rename(path, &quarantined)?;

    for suffix in ["-wal", "-shm"] {
        let mut sidecar = path.as_os_str().to_owned();
        sidecar.push(suffix);
        let sidecar = PathBuf::from(sidecar);
        if sidecar.exists() {
            std::fs::remove_file(&sidecar)?;
        }
    }

    Ok(quarantined)
}

#[cfg(test)]
#[path = "integrity_tests.rs"]
mod tests;
