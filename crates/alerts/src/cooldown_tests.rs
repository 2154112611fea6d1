// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pk_core::FakeClock;

#[test]
fn first_emission_is_allowed() {
    let mut tracker = CooldownTracker::new(Duration::from_secs(300), FakeClock::new());
    assert!(tracker.should_send("ransomware_detection_critical"));
}

#[test]
fn second_emission_within_cooldown_is_suppressed() {
    let clock = FakeClock::new();
    let mut tracker = CooldownTracker::new(Duration::from_secs(300), clock.clone());

    assert!(tracker.should_send("threshold_violation_medium"));
    clock.advance(Duration::from_secs(299));
    assert!(!tracker.should_send("threshold_violation_medium"));
}

#[test]
fn emission_allowed_again_after_cooldown() {
    let clock = FakeClock::new();
    let mut tracker = CooldownTracker::new(Duration::from_secs(300), clock.clone());

    assert!(tracker.should_send("anomaly_detected_high"));
    clock.advance(Duration::from_secs(300));
    assert!(tracker.should_send("anomaly_detected_high"));
}

#[test]
fn keys_are_independent() {
    let clock = FakeClock::new();
    let mut tracker = CooldownTracker::new(Duration::from_secs(300), clock);

    assert!(tracker.should_send("a_high"));
    assert!(tracker.should_send("a_medium"));
    assert!(tracker.should_send("b_high"));
    assert!(!tracker.should_send("a_high"));
}

#[test]
fn suppressed_attempt_does_not_extend_the_cooldown() {
    let clock = FakeClock::new();
    let mut tracker = CooldownTracker::new(Duration::from_secs(300), clock.clone());

    assert!(tracker.should_send("k"));
    clock.advance(Duration::from_secs(200));
    assert!(!tracker.should_send("k"));
    clock.advance(Duration::from_secs(100));
    // 300s after the emission, not 300s after the suppressed attempt
    assert!(tracker.should_send("k"));
}
