// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::provider::StaticMetrics;
use crate::state::Severity;
use parking_lot::Mutex as PlMutex;
use pgvigil_core::FakeClock;
use std::time::Duration as StdDuration;

/// Sink that records calls for assertions.
#[derive(Default)]
struct MemorySink {
    events: PlMutex<Vec<(String, Severity, Severity)>>,
    acks: PlMutex<Vec<String>>,
    fail: std::sync::atomic::AtomicBool,
}

impl EventSink for MemorySink {
    fn save_event(&self, change: &StateChange) -> Result<(), String> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err("sink unavailable".to_string());
        }
        self.events.lock().push((
            change.rule_name.clone(),
            change.prev_state,
            change.new_state,
        ));
        Ok(())
    }

    fn acknowledge_event(
        &self,
        rule_name: &str,
        _acknowledged_by: &str,
        _at: DateTime<Utc>,
    ) -> Result<(), String> {
        self.acks.lock().push(rule_name.to_string());
        Ok(())
    }
}

fn high_conn_rule() -> RuleConfig {
    RuleConfig {
        name: "high_conn".to_string(),
        metric: "active_connections / max_connections".to_string(),
        operator: ">".to_string(),
        warning: 0.8,
        critical: 0.95,
        enabled: true,
        message: Some("at {ValueFmt} of {ThreshFmt}".to_string()),
    }
}

fn metrics(ratio: f64) -> StaticMetrics {
    StaticMetrics::new([("active_connections", ratio * 100.0), ("max_connections", 100.0)])
}

#[test]
fn threshold_crossing_emits_ordered_transitions() {
    let clock = FakeClock::new();
    let sink = Arc::new(MemorySink::default());
    let engine = AlertEngine::new(clock.clone()).with_sink(sink.clone());
    assert_eq!(engine.load_rules(&[high_conn_rule()]), 1);

    let mut transitions = Vec::new();
    for ratio in [0.5, 0.85, 0.97, 0.5] {
        clock.advance(StdDuration::from_secs(5));
        for change in engine.evaluate_cycle(&metrics(ratio)) {
            transitions.push((change.prev_state, change.new_state, change.threshold));
        }
    }

    assert_eq!(
        transitions,
        vec![
            (Severity::Normal, Severity::Warning, 0.8),
            (Severity::Warning, Severity::Critical, 0.95),
            (Severity::Critical, Severity::Normal, 0.0),
        ]
    );

    // Persisted in the same order.
    let events = sink.events.lock().clone();
    assert_eq!(
        events,
        vec![
            ("high_conn".to_string(), Severity::Normal, Severity::Warning),
            ("high_conn".to_string(), Severity::Warning, Severity::Critical),
            ("high_conn".to_string(), Severity::Critical, Severity::Normal),
        ]
    );
}

#[test]
fn triggered_at_advances_only_on_state_change() {
    let clock = FakeClock::new();
    let engine = AlertEngine::new(clock.clone());
    engine.load_rules(&[high_conn_rule()]);

    engine.evaluate_cycle(&metrics(0.85));
    let triggered = engine.states()[0].triggered_at;

    // Same severity on later cycles: triggered_at must not move.
    for _ in 0..3 {
        clock.advance(StdDuration::from_secs(5));
        assert!(engine.evaluate_cycle(&metrics(0.86)).is_empty());
        assert_eq!(engine.states()[0].triggered_at, triggered);
    }

    clock.advance(StdDuration::from_secs(5));
    engine.evaluate_cycle(&metrics(0.97));
    assert!(engine.states()[0].triggered_at > triggered);
}

#[test]
fn acknowledgment_clears_on_fresh_activation() {
    let clock = FakeClock::new();
    let sink = Arc::new(MemorySink::default());
    let engine = AlertEngine::new(clock.clone()).with_sink(sink.clone());
    engine.load_rules(&[high_conn_rule()]);

    engine.evaluate_cycle(&metrics(0.85));
    engine.acknowledge("high_conn", "oncall").unwrap();
    assert!(engine.states()[0].acknowledged);
    assert_eq!(sink.acks.lock().clone(), vec!["high_conn".to_string()]);

    // warning -> critical stays active: acknowledgment survives.
    clock.advance(StdDuration::from_secs(5));
    engine.evaluate_cycle(&metrics(0.97));
    assert!(engine.states()[0].acknowledged);

    // Resolve, then re-trigger: acknowledgment must clear.
    clock.advance(StdDuration::from_secs(5));
    engine.evaluate_cycle(&metrics(0.5));
    clock.advance(StdDuration::from_secs(5));
    engine.evaluate_cycle(&metrics(0.85));
    let state = &engine.states()[0];
    assert!(!state.acknowledged);
    assert_eq!(state.acknowledged_at, None);
}

#[test]
fn acknowledge_requires_an_active_unacknowledged_alert() {
    let clock = FakeClock::new();
    let engine = AlertEngine::new(clock.clone());
    engine.load_rules(&[high_conn_rule()]);

    assert!(matches!(
        engine.acknowledge("high_conn", "oncall"),
        Err(EngineError::NotActive(_))
    ));
    assert!(matches!(engine.acknowledge("nope", "oncall"), Err(EngineError::UnknownRule(_))));

    engine.evaluate_cycle(&metrics(0.85));
    engine.acknowledge("high_conn", "oncall").unwrap();
    assert!(matches!(
        engine.acknowledge("high_conn", "oncall"),
        Err(EngineError::AlreadyAcknowledged(_))
    ));
}

#[test]
fn invalid_rules_are_skipped_without_blocking_others() {
    let clock = FakeClock::new();
    let engine = AlertEngine::new(clock);

    let mut broken = high_conn_rule();
    broken.name = "broken".to_string();
    broken.warning = 0.99;

    let loaded = engine.load_rules(&[broken, high_conn_rule()]);
    assert_eq!(loaded, 1);
    assert_eq!(engine.rule_count(), 1);
    assert_eq!(engine.states().len(), 1);
    assert_eq!(engine.states()[0].rule_name, "high_conn");
}

#[test]
fn loading_twice_produces_identical_state_maps() {
    let clock = FakeClock::new();
    let engine = AlertEngine::new(clock);

    engine.load_rules(&[high_conn_rule()]);
    let first = engine.states();
    engine.load_rules(&[high_conn_rule()]);
    assert_eq!(engine.states(), first);
}

#[test]
fn unavailable_metric_skips_rule_for_the_cycle() {
    let clock = FakeClock::new();
    let engine = AlertEngine::new(clock);
    engine.load_rules(&[high_conn_rule()]);

    let empty = StaticMetrics::new(Vec::<(String, f64)>::new());
    assert!(engine.evaluate_cycle(&empty).is_empty());
    assert_eq!(engine.states()[0].current_state, Severity::Normal);
}

#[test]
fn disabled_rules_are_not_evaluated() {
    let clock = FakeClock::new();
    let engine = AlertEngine::new(clock);
    let mut rule = high_conn_rule();
    rule.enabled = false;
    engine.load_rules(&[rule]);

    assert!(engine.evaluate_cycle(&metrics(0.99)).is_empty());
}

#[test]
fn sink_failure_does_not_poison_the_cycle() {
    let clock = FakeClock::new();
    let sink = Arc::new(MemorySink::default());
    sink.fail.store(true, std::sync::atomic::Ordering::SeqCst);
    let engine = AlertEngine::new(clock).with_sink(sink);
    engine.load_rules(&[high_conn_rule()]);

    // The change is still reported even though persistence failed.
    let changes = engine.evaluate_cycle(&metrics(0.85));
    assert_eq!(changes.len(), 1);
}
