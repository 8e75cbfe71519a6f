// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex as PlMutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn sample_payload(name: &str) -> WebhookPayload {
    WebhookPayload {
        event: WebhookEvent::AlertTriggered,
        alert: AlertBody {
            name: name.to_string(),
            metric: "tps".to_string(),
            state: Severity::Warning,
            previous_state: Severity::Normal,
            value: 120.5,
            threshold: 100.0,
            triggered_at: Utc::now(),
            message: Some("tps at 120.50".to_string()),
        },
        timestamp: Utc::now(),
        agent: AgentBody {
            version: "0.3.0".to_string(),
            hostname: Some("db-agent-1".to_string()),
            instance: Some("default".to_string()),
        },
    }
}

fn fast_config(addr: SocketAddr) -> WebhookConfig {
    WebhookConfig {
        initial_backoff: Duration::from_millis(20),
        max_backoff: Duration::from_millis(100),
        timeout: Duration::from_secs(2),
        ..WebhookConfig::new(format!("http://{addr}/hook"))
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Serve one canned status per expected request, recording request bodies.
async fn http_server(responses: Vec<u16>) -> (SocketAddr, Arc<PlMutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let bodies = Arc::new(PlMutex::new(Vec::new()));
    let recorded = bodies.clone();

    tokio::spawn(async move {
        for status in responses {
            let Ok((mut socket, _)) = listener.accept().await else { break };
            let mut buf = Vec::new();
            let mut tmp = [0u8; 4096];
            let mut header_end = None;
            let mut content_len = None;
            loop {
                let n = match socket.read(&mut tmp).await {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(_) => break,
                };
                buf.extend_from_slice(&tmp[..n]);
                if header_end.is_none() {
                    if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
                        header_end = Some(pos + 4);
                        let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                        content_len = head.lines().find_map(|line| {
                            line.strip_prefix("content-length:")
                                .and_then(|v| v.trim().parse::<usize>().ok())
                        });
                    }
                }
                if let (Some(end), Some(len)) = (header_end, content_len) {
                    if buf.len() >= end + len {
                        break;
                    }
                }
            }
            if let (Some(end), Some(len)) = (header_end, content_len) {
                let body = buf[end..(end + len).min(buf.len())].to_vec();
                recorded.lock().push(String::from_utf8_lossy(&body).into_owned());
            }
            let response =
                format!("HTTP/1.1 {status} Canned\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (addr, bodies)
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within deadline");
}

#[test]
fn payload_serialization_round_trips() {
    let payload = sample_payload("high_conn");
    let json = serde_json::to_string(&payload).unwrap();
    assert!(json.contains("\"event\":\"alert_triggered\""));
    assert!(json.contains("\"state\":\"warning\""));
    assert!(json.contains("\"previous_state\":\"normal\""));
    let parsed: WebhookPayload = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, payload);
}

#[test]
fn optional_fields_are_omitted_when_absent() {
    let mut payload = sample_payload("high_conn");
    payload.alert.message = None;
    payload.agent.hostname = None;
    payload.agent.instance = None;
    let json = serde_json::to_string(&payload).unwrap();
    assert!(!json.contains("message"));
    assert!(!json.contains("hostname"));
    let parsed: WebhookPayload = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, payload);
}

#[tokio::test]
async fn delivers_in_fifo_order() {
    let (addr, bodies) = http_server(vec![200, 200]).await;
    let cancel = CancellationToken::new();
    let (notifier, handle) = WebhookNotifier::start(fast_config(addr), cancel.clone());

    notifier.send_async(sample_payload("first"));
    notifier.send_async(sample_payload("second"));

    wait_for(|| bodies.lock().len() == 2).await;
    let bodies = bodies.lock().clone();
    assert!(bodies[0].contains("\"first\""));
    assert!(bodies[1].contains("\"second\""));

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn retries_on_503_then_gives_up() {
    // Three 503s; a fourth request would get 200, but MaxRetries=3 means it
    // must never happen.
    let (addr, bodies) = http_server(vec![503, 503, 503, 200]).await;
    let cancel = CancellationToken::new();
    let (notifier, handle) = WebhookNotifier::start(fast_config(addr), cancel.clone());

    notifier.send_async(sample_payload("flappy"));

    wait_for(|| bodies.lock().len() == 3).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(bodies.lock().len(), 3, "no fourth attempt after giving up");

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (addr, bodies) = http_server(vec![400, 200]).await;
    let cancel = CancellationToken::new();
    let (notifier, handle) = WebhookNotifier::start(fast_config(addr), cancel.clone());

    notifier.send_async(sample_payload("rejected"));

    wait_for(|| bodies.lock().len() == 1).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(bodies.lock().len(), 1, "4xx must not be retried");

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn cancellation_drains_queue_then_exits() {
    let (addr, bodies) = http_server(vec![200, 200, 200]).await;
    let config = fast_config(addr);
    let cancel = CancellationToken::new();
    // Cancel before the worker starts; everything queued is drained with a
    // single attempt each and the worker exits on its own.
    let (notifier, handle) = WebhookNotifier::start(config, cancel.clone());
    notifier.send_async(sample_payload("one"));
    notifier.send_async(sample_payload("two"));
    cancel.cancel();
    handle.await.unwrap();
    assert!(bodies.lock().len() <= 2);
}

#[tokio::test]
async fn send_after_worker_stop_drops_quietly() {
    let (addr, _bodies) = http_server(vec![]).await;
    let cancel = CancellationToken::new();
    let (notifier, handle) = WebhookNotifier::start(fast_config(addr), cancel.clone());
    cancel.cancel();
    handle.await.unwrap();
    // Worker is gone; the send must neither block nor panic.
    notifier.send_async(sample_payload("dropped"));
}
