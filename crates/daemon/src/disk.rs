// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Free-space probe for the data directory.

use std::path::Path;

use tracing::{debug, warn};

/// Below this the daemon warns at startup. Collectors keep running; the
/// storage-full classifier downgrades their failures once the disk actually
/// fills up.
pub const MIN_FREE_BYTES: u64 = 10 * 1024 * 1024;

/// Bytes available to unprivileged writers on the filesystem holding `path`.
pub fn free_space(path: &Path) -> std::io::Result<u64> {
    let stat = nix::sys::statvfs::statvfs(path)?;
    Ok(stat.blocks_available() as u64 * stat.fragment_size() as u64)
}

/// Emit a warning when free space is below [`MIN_FREE_BYTES`]. Never fatal
/// at startup.
pub fn warn_if_low(path: &Path) {
    match free_space(path) {
        Ok(free) if free < MIN_FREE_BYTES => {
            warn!(
                path = %path.display(),
                free_bytes = free,
                "data directory is low on disk space"
            );
        }
        Ok(free) => {
            debug!(path = %path.display(), free_bytes = free, "disk space probe");
        }
        Err(err) => {
            debug!(path = %path.display(), error = %err, "disk space probe failed");
        }
    }
}

#[cfg(test)]
#[path = "disk_tests.rs"]
mod tests;
