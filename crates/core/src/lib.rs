// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pgvigil-core: configuration, clock, and shared record types for the
//! pgvigil monitoring agent.

pub mod clock;
pub mod config;
pub mod conninfo;
pub mod records;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    parse_duration, AgentConfig, AlertsConfig, Config, ConfigError, InstanceConfig, Intervals,
    Retention, RuleConfig,
};
pub use conninfo::{has_password, is_valid_instance_name, is_valid_rule_name, redact_conn_string};
pub use records::{
    ActivityRow, AgentStatusRecord, AlertEventRecord, DeadlockEvent, DeadlockProcess,
    InstanceRecord, InstanceStatus, LockRow, MetricRow, QueryStatRow, ReplicationLagRow,
};
