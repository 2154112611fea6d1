// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{snapshot, test_context};
use pk_core::RegistrationStatus;

#[tokio::test]
async fn tick_caches_sample_and_heartbeats() {
    let fixture = test_context();
    fixture.host.set_snapshot(snapshot(25.0, 50.0, 60.0));
    let sampler = Sampler::new(fixture.ctx.clone());

    sampler.tick().await.unwrap();

    let sample = fixture.store.latest_sample().unwrap().unwrap();
    assert_eq!(sample.cpu_percent, 25.0);
    assert_eq!(sample.disk_percent, 60.0);

    let heartbeats = fixture.backend.heartbeats();
    assert_eq!(heartbeats.len(), 1);
    assert_eq!(heartbeats[0]["cpu"]["percent"], 25.0);
    assert_eq!(heartbeats[0]["device_id"], fixture.ctx.device_id.as_str());

    // Nothing queued while online
    assert_eq!(
        fixture.store.pending_count(Some(pk_core::QueueType::Telemetry)).unwrap(),
        0
    );
}

#[tokio::test]
async fn heartbeat_updates_registration_row() {
    let fixture = test_context();
    fixture
        .store
        .save_registration(&pk_core::Registration {
            device_id: fixture.ctx.device_id.clone(),
            org_id: Some("org".to_string()),
            api_key: None,
            registered_at: None,
            last_heartbeat: None,
            status: RegistrationStatus::Active,
        })
        .unwrap();
    fixture.host.set_snapshot(snapshot(10.0, 10.0, 10.0));

    Sampler::new(fixture.ctx.clone()).tick().await.unwrap();

    let registration = fixture
        .store
        .registration(&fixture.ctx.device_id)
        .unwrap()
        .unwrap();
    assert!(registration.last_heartbeat.is_some());
}

#[tokio::test]
async fn offline_heartbeat_queues_payload_at_priority_one() {
    let fixture = test_context();
    fixture.backend.set_offline(true);
    fixture.host.set_snapshot(snapshot(25.0, 50.0, 60.0));

    Sampler::new(fixture.ctx.clone()).tick().await.unwrap();

    let items = fixture
        .store
        .claim(Some(pk_core::QueueType::Telemetry), 10)
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].priority, 1);
    assert_eq!(items[0].payload["cpu"]["percent"], 25.0);
}

#[tokio::test]
async fn cpu_over_threshold_writes_medium_violation() {
    let fixture = test_context();
    fixture.host.set_snapshot(snapshot(95.0, 50.0, 60.0));

    Sampler::new(fixture.ctx.clone()).tick().await.unwrap();

    let events = fixture
        .store
        .unresolved_events_since(chrono::Utc::now() - chrono::Duration::hours(1))
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "threshold_violation");
    assert_eq!(events[0].severity, pk_core::Severity::Medium);
    assert_eq!(
        events[0].details.as_ref().unwrap()["resource_type"],
        "CPU"
    );
}

#[tokio::test]
async fn disk_violation_is_high_and_stacks_with_others() {
    let fixture = test_context();
    fixture.host.set_snapshot(snapshot(95.0, 90.0, 95.0));

    Sampler::new(fixture.ctx.clone()).tick().await.unwrap();

    let events = fixture
        .store
        .unresolved_events_since(chrono::Utc::now() - chrono::Duration::hours(1))
        .unwrap();
    assert_eq!(events.len(), 3);
    let disk = events
        .iter()
        .find(|e| e.details.as_ref().unwrap()["resource_type"] == "Disk")
        .unwrap();
    assert_eq!(disk.severity, pk_core::Severity::High);
}

#[tokio::test]
async fn quiet_host_writes_no_events() {
    let fixture = test_context();
    fixture.host.set_snapshot(snapshot(10.0, 20.0, 30.0));

    Sampler::new(fixture.ctx.clone()).tick().await.unwrap();

    assert!(fixture
        .store
        .unresolved_events_since(chrono::Utc::now() - chrono::Duration::hours(1))
        .unwrap()
        .is_empty());
}
