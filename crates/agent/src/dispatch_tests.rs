// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::test_context;
use pk_alerts::FakeTransport;
use pk_core::{FakeClock, NewSecurityEvent};

struct Harness {
    fixture: crate::test_support::TestCtx,
    transport: FakeTransport,
    clock: FakeClock,
    dispatcher: AlertDispatcher<FakeClock>,
}

fn harness() -> Harness {
    let fixture = test_context();
    let transport = FakeTransport::new();
    let clock = FakeClock::new();
    let dispatcher = AlertDispatcher::new(
        fixture.store.clone(),
        Arc::clone(&fixture.ctx.config),
        vec![Arc::new(transport.clone())],
        clock.clone(),
    );
    Harness {
        fixture,
        transport,
        clock,
        dispatcher,
    }
}

#[tokio::test]
async fn unresolved_event_is_alerted_and_resolved() {
    let mut h = harness();
    let id = h
        .fixture
        .store
        .insert_security_event(&NewSecurityEvent::new(
            "ransomware_detection",
            Severity::Critical,
            "encryption burst",
        ))
        .unwrap();

    assert_eq!(h.dispatcher.tick().await.unwrap(), 1);

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].alert_type, "ransomware_detection");
    assert!(sent[0].message.contains("encryption burst"));

    // Resolved, so the next tick is quiet
    assert!(h
        .fixture
        .store
        .unresolved_events_since(Utc::now() - chrono::Duration::hours(1))
        .unwrap()
        .is_empty());
    assert_eq!(h.dispatcher.tick().await.unwrap(), 0);

    // And the audit trail has the emission
    let audit = h.fixture.store.recent_audit(5).unwrap();
    assert!(audit.iter().any(|e| e.action == "alert_sent"));
    let _ = id;
}

#[tokio::test]
async fn cooldown_suppresses_same_key_until_elapsed() {
    let mut h = harness();
    h.fixture
        .store
        .insert_security_event(&NewSecurityEvent::new(
            "threshold_violation",
            Severity::Medium,
            "cpu high",
        ))
        .unwrap();
    assert_eq!(h.dispatcher.tick().await.unwrap(), 1);

    // Same key within cooldown: suppressed and left unresolved
    h.fixture
        .store
        .insert_security_event(&NewSecurityEvent::new(
            "threshold_violation",
            Severity::Medium,
            "cpu high again",
        ))
        .unwrap();
    assert_eq!(h.dispatcher.tick().await.unwrap(), 0);
    assert_eq!(
        h.fixture
            .store
            .unresolved_events_since(Utc::now() - chrono::Duration::hours(1))
            .unwrap()
            .len(),
        1
    );

    // After the cooldown the held-back event goes out
    h.clock.advance(Duration::from_secs(300));
    assert_eq!(h.dispatcher.tick().await.unwrap(), 1);
    assert_eq!(h.transport.sent().len(), 2);
}

#[tokio::test]
async fn different_severities_have_independent_cooldowns() {
    let mut h = harness();
    for severity in [Severity::Medium, Severity::High] {
        h.fixture
            .store
            .insert_security_event(&NewSecurityEvent::new(
                "anomaly_detected",
                severity,
                "odd behavior",
            ))
            .unwrap();
    }

    assert_eq!(h.dispatcher.tick().await.unwrap(), 2);
}

#[tokio::test]
async fn transport_failure_still_resolves_the_event() {
    let mut h = harness();
    h.transport.set_fail(true);
    h.fixture
        .store
        .insert_security_event(&NewSecurityEvent::new(
            "suspicious_process",
            Severity::High,
            "bad name",
        ))
        .unwrap();

    assert_eq!(h.dispatcher.tick().await.unwrap(), 1);
    assert!(h.transport.sent().is_empty());
    assert!(h
        .fixture
        .store
        .unresolved_events_since(Utc::now() - chrono::Duration::hours(1))
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn disabled_alerts_do_nothing() {
    let mut h = harness();
    h.fixture
        .ctx
        .config
        .lock()
        .set("alerts", "enabled", "false")
        .unwrap();
    h.fixture
        .store
        .insert_security_event(&NewSecurityEvent::new(
            "ransomware_detection",
            Severity::Critical,
            "burst",
        ))
        .unwrap();

    assert_eq!(h.dispatcher.tick().await.unwrap(), 0);
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn interesting_commands_alert_once() {
    let mut h = harness();
    h.fixture
        .store
        .insert_command("c1", "backup", &serde_json::json!({}))
        .unwrap();
    h.fixture
        .store
        .set_command_status(
            "c1",
            pk_core::CommandStatus::Completed,
            Some(&serde_json::json!({"success": true})),
        )
        .unwrap();

    assert_eq!(h.dispatcher.tick().await.unwrap(), 1);
    assert_eq!(h.transport.sent()[0].alert_type, "command_executed");

    // Seen commands never re-alert, even after the cooldown
    h.clock.advance(Duration::from_secs(600));
    assert_eq!(h.dispatcher.tick().await.unwrap(), 0);
}

#[tokio::test]
async fn boring_command_types_are_ignored() {
    let mut h = harness();
    h.fixture
        .store
        .insert_command("c1", "get_status", &serde_json::json!({}))
        .unwrap();

    assert_eq!(h.dispatcher.tick().await.unwrap(), 0);
}

#[tokio::test]
async fn event_vars_include_metrics_snapshot() {
    let mut h = harness();
    h.fixture
        .store
        .insert_sample(&pk_core::TelemetrySample {
            timestamp: Utc::now(),
            cpu_percent: 42.0,
            memory_percent: 51.0,
            disk_percent: 66.0,
            processes_count: 100,
            uptime_seconds: 100,
            ip_address: Some("10.0.0.9".to_string()),
            network_io: serde_json::Value::Null,
        })
        .unwrap();
    h.fixture
        .store
        .insert_security_event(&NewSecurityEvent::new(
            "anomaly_detected",
            Severity::High,
            "weird",
        ))
        .unwrap();

    h.dispatcher.tick().await.unwrap();
    let message = &h.transport.sent()[0].message;
    assert!(message.contains("CPU Usage: 42.0%"));
    assert!(message.contains("10.0.0.9"));
}
