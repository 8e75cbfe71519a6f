// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pgvigil_core::{FakeClock, RuleConfig};
use pgvigil_engine::StaticMetrics;
use tempfile::TempDir;

fn rule() -> RuleConfig {
    RuleConfig {
        name: "high_conn".to_string(),
        metric: "active_connections / max_connections".to_string(),
        operator: ">".to_string(),
        warning: 0.8,
        critical: 0.95,
        enabled: true,
        message: None,
    }
}

fn metrics(ratio: f64) -> StaticMetrics {
    StaticMetrics::new([("active_connections", ratio * 100.0), ("max_connections", 100.0)])
}

#[test]
fn store_sink_persists_transitions_in_order() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(&dir.path().join("pgvigil.db")).unwrap();
    let clock = FakeClock::new();
    let engine =
        AlertEngine::new(clock.clone()).with_sink(Arc::new(StoreSink::new(store.clone())));
    engine.load_rules(&[rule()]);

    for ratio in [0.5, 0.85, 0.97, 0.5] {
        clock.advance(std::time::Duration::from_secs(5));
        engine.evaluate_cycle(&metrics(ratio));
    }

    let events = store.recent_alert_events(10).unwrap();
    // Newest first: resolved, critical, warning.
    let transitions: Vec<(String, String)> = events
        .iter()
        .map(|event| (event.prev_state.clone(), event.new_state.clone()))
        .collect();
    assert_eq!(
        transitions,
        vec![
            ("critical".to_string(), "normal".to_string()),
            ("warning".to_string(), "critical".to_string()),
            ("normal".to_string(), "warning".to_string()),
        ]
    );
    assert_eq!(events[1].threshold_value, 0.95);
}

#[test]
fn acknowledge_flows_through_to_the_event_row() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(&dir.path().join("pgvigil.db")).unwrap();
    let clock = FakeClock::new();
    let engine =
        AlertEngine::new(clock.clone()).with_sink(Arc::new(StoreSink::new(store.clone())));
    engine.load_rules(&[rule()]);

    engine.evaluate_cycle(&metrics(0.85));
    engine.acknowledge("high_conn", "oncall").unwrap();

    let events = store.recent_alert_events(1).unwrap();
    assert_eq!(events[0].acknowledged_by.as_deref(), Some("oncall"));
    assert!(events[0].acknowledged_at.is_some());
}
