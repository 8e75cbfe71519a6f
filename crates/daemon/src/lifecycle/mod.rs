// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup ordering, shutdown ordering,
//! cancellation fan-out.

mod startup;
pub use startup::startup;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pgvigil_core::ConfigError;
use pgvigil_storage::{Store, StoreError};

use crate::env;
use crate::pidfile::{self, PidFileError};
use crate::pool::{PoolError, PoolManager};
use crate::scheduler::CollectorScheduler;

/// Filesystem layout under the data directory.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root data directory.
    pub data_dir: PathBuf,
    /// Embedded database file (WAL sidecars live next to it).
    pub db_path: PathBuf,
    /// Process-identifier file.
    pub pid_path: PathBuf,
}

impl Paths {
    /// Resolve from config, environment override, then platform default.
    pub fn resolve(config: &pgvigil_core::Config) -> Result<Self, LifecycleError> {
        let data_dir = config
            .agent
            .data_dir
            .clone()
            .or_else(env::data_dir_override)
            .or_else(env::default_data_dir)
            .ok_or(LifecycleError::NoDataDir)?;
        Ok(Self {
            db_path: data_dir.join("pgvigil.db"),
            pid_path: data_dir.join("pgvigild.pid"),
            data_dir,
        })
    }
}

/// Running daemon: owns the cancellation root and every background task.
pub struct Daemon {
    pub paths: Paths,
    pub(crate) store: Store,
    pub(crate) pools: Arc<PoolManager>,
    pub(crate) scheduler: CollectorScheduler,
    /// Health check, retention sweeper, alert loop, webhook worker.
    pub(crate) tasks: Vec<JoinHandle<()>>,
    pub(crate) cancel: CancellationToken,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon").field("paths", &self.paths).finish_non_exhaustive()
    }
}

impl Daemon {
    /// Token clone for signal wiring.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Ordered shutdown: trip the token, join every loop within the drain
    /// window, close pools, checkpoint, drop the liveness markers.
    pub async fn shutdown(mut self) {
        info!("shutting down");
        self.cancel.cancel();

        let drain = env::drain_timeout();
        let joins = async {
            for task in self.tasks.drain(..) {
                let _ = task.await;
            }
            self.scheduler.stop().await;
        };
        if tokio::time::timeout(drain, joins).await.is_err() {
            warn!(timeout_ms = drain.as_millis() as u64, "drain window elapsed, abandoning tasks");
        }

        self.pools.close().await;

        if let Err(err) = self.store.checkpoint() {
            warn!(error = %err, "final checkpoint failed");
        }
        // Its absence signals clean shutdown to the next start.
        if let Err(err) = self.store.delete_agent_status() {
            warn!(error = %err, "failed to delete agent status");
        }
        pidfile::release(&self.paths.pid_path);

        info!("shutdown complete");
    }
}

/// Lifecycle errors; only these abort the process at startup.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine data directory")]
    NoDataDir,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    PidFile(#[from] PidFileError),

    #[error("pool: {0}")]
    Pool(#[from] PoolError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl LifecycleError {
    /// Process exit code for a startup failure: permission problems exit 1,
    /// a live agent exits 2, everything else is a start failure (3).
    pub fn exit_code(&self) -> i32 {
        match self {
            LifecycleError::PidFile(PidFileError::AlreadyRunning(_)) => 2,
            LifecycleError::Io(err) if err.kind() == std::io::ErrorKind::PermissionDenied => 1,
            LifecycleError::PidFile(PidFileError::Io(err))
                if err.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                1
            }
            LifecycleError::Store(StoreError::Io(err))
                if err.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                1
            }
            _ => 3,
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
