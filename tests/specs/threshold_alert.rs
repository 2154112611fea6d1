// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Threshold violation end to end: sampler tick writes the event, the
//! dispatcher emits exactly one alert within a cooldown window.

use crate::prelude::{fixture, snapshot};
use chrono::Utc;
use pk_agent::{AlertDispatcher, Sampler};
use pk_alerts::FakeTransport;
use pk_core::{FakeClock, Severity};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn cpu_violation_produces_one_event_and_one_alert() {
    let fx = fixture();
    fx.host.set_snapshot(snapshot(95.0, 40.0, 50.0));

    Sampler::new(fx.ctx.clone()).tick().await.unwrap();

    let events = fx
        .store
        .unresolved_events_since(Utc::now() - chrono::Duration::hours(1))
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "threshold_violation");
    assert_eq!(events[0].severity, Severity::Medium);

    let transport = FakeTransport::new();
    let clock = FakeClock::new();
    let mut dispatcher = AlertDispatcher::new(
        fx.store.clone(),
        Arc::clone(&fx.ctx.config),
        vec![Arc::new(transport.clone())],
        clock.clone(),
    );

    assert_eq!(dispatcher.tick().await.unwrap(), 1);
    assert_eq!(transport.sent().len(), 1);
    assert_eq!(transport.sent()[0].alert_type, "threshold_violation");

    // A second violation within the cooldown stays queued
    Sampler::new(fx.ctx.clone()).tick().await.unwrap();
    assert_eq!(dispatcher.tick().await.unwrap(), 0);
    assert_eq!(transport.sent().len(), 1);

    // After the cooldown the held-back event is emitted
    clock.advance(Duration::from_secs(300));
    assert_eq!(dispatcher.tick().await.unwrap(), 1);
    assert_eq!(transport.sent().len(), 2);
}
