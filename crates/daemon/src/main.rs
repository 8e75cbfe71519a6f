// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! pgvigild - PostgreSQL monitoring agent daemon.
//!
//! Samples a fleet of PostgreSQL instances into an embedded store,
//! prunes retention, evaluates alert rules, and delivers webhooks.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use pgvigil_core::Config;
use pgvigil_daemon::{env, startup};

/// PostgreSQL monitoring agent daemon.
#[derive(Parser)]
#[command(name = "pgvigild", about = "PostgreSQL monitoring agent", version)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "pgvigil.toml")]
    config: PathBuf,

    /// Write daily-rotated log files to this directory instead of stderr.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

fn log_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// Returns a guard that must outlive the process when file logging is on.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        EnvFilter::from_default_env().add_directive(log_level(args.verbose, args.quiet).into());

    if let Some(dir) = &args.log_dir {
        let appender = tracing_appender::rolling::daily(dir, "pgvigild.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
        None
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let _log_guard = init_logging(&args);
    std::process::exit(run(&args).await);
}

async fn run(args: &Args) -> i32 {
    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!(path = %args.config.display(), error = %err, "invalid configuration");
            return 3;
        }
    };

    if !config.agent.enabled {
        info!("agent is disabled in configuration; nothing to do");
        return 0;
    }

    info!(version = env::AGENT_VERSION, config = %args.config.display(), "pgvigild starting");

    let daemon = match startup(&config).await {
        Ok(daemon) => daemon,
        Err(err) => {
            error!(error = %err, "startup failed");
            return err.exit_code();
        }
    };

    wait_for_shutdown_signal().await;
    daemon.shutdown().await;
    0
}

async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(err) => {
            error!(error = %err, "failed to install SIGTERM handler");
            // Fall back to Ctrl-C only.
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received interrupt"),
        _ = term.recv() => info!("received terminate"),
    }
}
