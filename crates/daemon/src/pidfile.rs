// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-identifier file with stale detection.
//!
//! Format: a single decimal pid followed by a newline, mode 0644, parent
//! directory created 0755. A file whose holder no longer answers a
//! zero-signal probe is stale and gets replaced; a live holder is fatal.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum PidFileError {
    #[error("pid file io: {0}")]
    Io(#[from] std::io::Error),

    #[error("agent already running with pid {0}")]
    AlreadyRunning(i32),
}

/// Write this process's pid, replacing a stale file. Fails if the recorded
/// holder is still alive.
pub fn acquire(path: &Path) -> Result<(), PidFileError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
        std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o755))?;
    }

    if let Some(existing) = read_pid(path)? {
        if process_alive(existing) {
            return Err(PidFileError::AlreadyRunning(existing));
        }
        warn!(pid = existing, "removing stale pid file");
        std::fs::remove_file(path)?;
    }

    std::fs::write(path, format!("{}\n", std::process::id()))?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))?;
    Ok(())
}

/// Remove the pid file; absence is not an error.
pub fn release(path: &Path) {
    if path.exists() {
        if let Err(err) = std::fs::remove_file(path) {
            warn!(error = %err, "failed to remove pid file");
        }
    }
}

/// Read the recorded pid. A malformed file counts as stale (None).
fn read_pid(path: &Path) -> Result<Option<i32>, PidFileError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    match raw.trim().parse::<i32>() {
        Ok(pid) if pid > 0 => Ok(Some(pid)),
        _ => {
            warn!(path = %path.display(), "pid file is malformed, treating as stale");
            Ok(None)
        }
    }
}

/// Zero-signal liveness probe. EPERM means the process exists but belongs
/// to someone else, which still counts as alive.
fn process_alive(pid: i32) -> bool {
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(test)]
#[path = "pidfile_tests.rs"]
mod tests;
