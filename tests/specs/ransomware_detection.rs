// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mass-rename and encryption-pattern detection through the file watcher.

use crate::prelude::fixture;
use chrono::Utc;
use pk_agent::FileWatcher;
use pk_core::Severity;
use pk_sensors::{FsEvent, FsEventKind};
use std::path::PathBuf;
use std::time::Instant;

fn moved(path: &str) -> FsEvent {
    FsEvent {
        kind: FsEventKind::Moved,
        path: PathBuf::from(path),
        dest_path: None,
    }
}

fn created(path: &str) -> FsEvent {
    FsEvent {
        kind: FsEventKind::Created,
        path: PathBuf::from(path),
        dest_path: None,
    }
}

#[test]
fn thirty_one_renames_in_a_minute_yield_one_high_event() {
    let fx = fixture();
    let mut watcher = FileWatcher::new(fx.store.clone(), &fx.ctx.config);
    let now = Instant::now();

    for i in 0..31 {
        watcher
            .handle_event(&moved(&format!("/watched/doc{i}.txt")), now)
            .unwrap();
    }

    let events = fx
        .store
        .unresolved_events_since(Utc::now() - chrono::Duration::hours(1))
        .unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.event_type, "ransomware_detection");
    assert_eq!(event.severity, Severity::High);

    let details = event.details.as_ref().unwrap();
    assert_eq!(details["detector"], "mass_renames");
    assert!(details["count"].as_u64().unwrap() >= 31);
}

#[test]
fn six_locked_files_yield_critical_event_with_file_list() {
    let fx = fixture();
    let mut watcher = FileWatcher::new(fx.store.clone(), &fx.ctx.config);
    let now = Instant::now();

    for i in 0..6 {
        watcher
            .handle_event(&created(&format!("/watched/report{i}.locked")), now)
            .unwrap();
    }

    let events = fx
        .store
        .unresolved_events_since(Utc::now() - chrono::Duration::hours(1))
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].severity, Severity::Critical);

    let details = events[0].details.as_ref().unwrap();
    assert_eq!(details["detector"], "encryption_patterns");
    assert_eq!(details["files"].as_array().unwrap().len(), 6);
}
