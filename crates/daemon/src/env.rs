// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

/// Agent version (from Cargo.toml)
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Data directory override.
pub fn data_dir_override() -> Option<PathBuf> {
    std::env::var("PGVIGIL_DATA_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// Platform default data directory (e.g. ~/.local/share/pgvigil).
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("pgvigil"))
}

/// Database password used when a connection string carries none and no
/// interactive prompt is available.
pub fn db_password() -> Option<String> {
    std::env::var("PGVIGIL_DB_PASSWORD").ok().filter(|s| !s.is_empty())
}

/// Shutdown drain timeout (default 5s, configurable via
/// `PGVIGIL_DRAIN_TIMEOUT_MS`).
pub fn drain_timeout() -> Duration {
    std::env::var("PGVIGIL_DRAIN_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// Best-effort hostname for the webhook payload.
pub fn hostname() -> Option<String> {
    nix::unistd::gethostname().ok().and_then(|name| name.into_string().ok())
}
