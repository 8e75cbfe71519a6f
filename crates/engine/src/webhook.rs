// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook delivery: a fixed-capacity FIFO queue drained by a single
//! worker with exponential backoff.
//!
//! Producers are the alert loop's tight cycle, so a full queue drops the
//! payload instead of blocking. On cancellation the worker drains whatever
//! is still queued without waiting for new sends, then exits.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::state::{Severity, StateChange};
use crate::template;

/// Queue slots; sends beyond this are dropped.
pub const QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    /// Per-request deadline.
    pub timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Includes the first try.
    pub max_attempts: u32,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

/// Wire-stable payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event: WebhookEvent,
    pub alert: AlertBody,
    pub timestamp: DateTime<Utc>,
    pub agent: AgentBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    AlertTriggered,
    AlertResolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertBody {
    pub name: String,
    pub metric: String,
    pub state: Severity,
    pub previous_state: Severity,
    pub value: f64,
    pub threshold: f64,
    pub triggered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentBody {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl WebhookPayload {
    /// Build the outbound payload for a state change, rendering the rule's
    /// message template at this surface.
    pub fn from_change(change: &StateChange, timestamp: DateTime<Utc>, agent: AgentBody) -> Self {
        let event = if change.is_resolution() {
            WebhookEvent::AlertResolved
        } else {
            WebhookEvent::AlertTriggered
        };
        let message =
            change.message_template.as_deref().map(|tpl| template::render(tpl, change));
        Self {
            event,
            alert: AlertBody {
                name: change.rule_name.clone(),
                metric: change.metric.clone(),
                state: change.new_state,
                previous_state: change.prev_state,
                value: change.metric_value,
                threshold: change.threshold,
                triggered_at: change.triggered_at,
                message,
            },
            timestamp,
            agent,
        }
    }
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned {status}")]
    Retryable { status: u16 },

    #[error("server rejected payload with {status}")]
    Rejected { status: u16 },

    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<WebhookError> },

    #[error("delivery cancelled")]
    Cancelled,
}

impl WebhookError {
    fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Request(_) | WebhookError::Retryable { .. })
    }
}

/// Producer handle for the delivery queue. Cheap to clone.
#[derive(Clone)]
pub struct WebhookNotifier {
    tx: mpsc::Sender<WebhookPayload>,
}

impl WebhookNotifier {
    /// Spawn the worker and return the producer handle plus its join handle
    /// so shutdown can wait for the drain.
    pub fn start(config: WebhookConfig, cancel: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let handle = tokio::spawn(worker(config, rx, cancel));
        (Self { tx }, handle)
    }

    /// Enqueue without blocking; a full queue drops the payload.
    pub fn send_async(&self, payload: WebhookPayload) {
        use mpsc::error::TrySendError;
        match self.tx.try_send(payload) {
            Ok(()) => {}
            Err(TrySendError::Full(payload)) => {
                warn!(rule = %payload.alert.name, "webhook queue full, dropping payload");
            }
            Err(TrySendError::Closed(payload)) => {
                warn!(rule = %payload.alert.name, "webhook worker stopped, dropping payload");
            }
        }
    }
}

async fn worker(
    config: WebhookConfig,
    mut rx: mpsc::Receiver<WebhookPayload>,
    cancel: CancellationToken,
) {
    let user_agent = format!("pgvigil-agent/{}", env!("CARGO_PKG_VERSION"));
    let client = match reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(user_agent)
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "failed to build webhook client");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Some(payload) => deliver_and_log(&client, &config, payload, &cancel).await,
                None => return,
            }
        }
    }

    // Cancelled: drain what is already queued. The tripped token makes any
    // backoff wait abort, so each remaining payload gets one attempt.
    while let Ok(payload) = rx.try_recv() {
        deliver_and_log(&client, &config, payload, &cancel).await;
    }
}

async fn deliver_and_log(
    client: &reqwest::Client,
    config: &WebhookConfig,
    payload: WebhookPayload,
    cancel: &CancellationToken,
) {
    match deliver(client, config, &payload, cancel).await {
        Ok(attempts) => {
            debug!(rule = %payload.alert.name, attempts, "webhook delivered");
        }
        Err(WebhookError::Cancelled) => {
            debug!(rule = %payload.alert.name, "webhook delivery cancelled");
        }
        Err(err) => {
            error!(rule = %payload.alert.name, error = %err, "webhook delivery failed");
        }
    }
}

/// Deliver one payload with retry. Returns the number of attempts used.
async fn deliver(
    client: &reqwest::Client,
    config: &WebhookConfig,
    payload: &WebhookPayload,
    cancel: &CancellationToken,
) -> Result<u32, WebhookError> {
    let mut attempt: u32 = 1;
    loop {
        match attempt_delivery(client, config, payload).await {
            Ok(()) => return Ok(attempt),
            Err(err) if err.is_retryable() && attempt < config.max_attempts => {
                let exponent = attempt.saturating_sub(1).min(16);
                let backoff =
                    config.initial_backoff.saturating_mul(1 << exponent).min(config.max_backoff);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(WebhookError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
                attempt += 1;
            }
            Err(err) if err.is_retryable() => {
                return Err(WebhookError::RetriesExhausted { attempts: attempt, last: Box::new(err) });
            }
            Err(err) => return Err(err),
        }
    }
}

async fn attempt_delivery(
    client: &reqwest::Client,
    config: &WebhookConfig,
    payload: &WebhookPayload,
) -> Result<(), WebhookError> {
    let response = client.post(&config.url).json(payload).send().await?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = read_body_prefix(response).await;
    if status.is_server_error() || status.as_u16() == 429 {
        debug!(status = status.as_u16(), body = %body, "retryable webhook failure");
        Err(WebhookError::Retryable { status: status.as_u16() })
    } else {
        debug!(status = status.as_u16(), body = %body, "permanent webhook failure");
        Err(WebhookError::Rejected { status: status.as_u16() })
    }
}

/// Read at most 1 KiB of the response body for logging.
async fn read_body_prefix(mut response: reqwest::Response) -> String {
    const CAP: usize = 1024;
    let mut buf: Vec<u8> = Vec::new();
    while buf.len() < CAP {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = (CAP - buf.len()).min(chunk.len());
                buf.extend_from_slice(&chunk[..take]);
                if take < chunk.len() {
                    break;
                }
            }
            Ok(None) | Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
