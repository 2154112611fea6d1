// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::test_context;
use pk_sensors::{FsEventKind, ProcessInfo};
use yare::parameterized;

fn fs_event(kind: FsEventKind, path: &str) -> FsEvent {
    FsEvent {
        kind,
        path: PathBuf::from(path),
        dest_path: None,
    }
}

#[parameterized(
    plain_prefix = { "/var/cache", "/var/cache/apt/lists", true },
    wildcard_child = { "/home/*", "/home/alice/doc.txt", true },
    wildcard_base_itself = { "/home/*", "/home", false },
    unrelated = { "/var/cache", "/srv/data/file", false },
)]
fn exclusion_patterns(pattern: &str, path: &str, excluded: bool) {
    assert_eq!(
        is_excluded(Path::new(path), &[pattern.to_string()]),
        excluded
    );
}

#[test]
fn rename_burst_writes_one_event_and_audit_row() {
    let fixture = test_context();
    let mut watcher = FileWatcher::new(fixture.store.clone(), &fixture.ctx.config);
    let now = Instant::now();

    let mut written = 0;
    for i in 0..31 {
        written += watcher
            .handle_event(
                &fs_event(FsEventKind::Moved, &format!("/watched/file{i}.txt")),
                now,
            )
            .unwrap();
    }
    assert_eq!(written, 1);

    let events = fixture
        .store
        .unresolved_events_since(chrono::Utc::now() - chrono::Duration::hours(1))
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "ransomware_detection");
    assert_eq!(
        events[0].details.as_ref().unwrap()["detector"],
        "mass_renames"
    );

    let audit = fixture.store.recent_audit(5).unwrap();
    assert!(audit
        .iter()
        .any(|entry| entry.action == "ransomware_alert_triggered"));
}

#[test]
fn excluded_paths_never_reach_the_ring() {
    let fixture = test_context();
    {
        let mut config = fixture.ctx.config.lock();
        config
            .set("monitoring", "exclude_paths", "/excluded")
            .unwrap();
    }
    let mut watcher = FileWatcher::new(fixture.store.clone(), &fixture.ctx.config);
    let now = Instant::now();

    for i in 0..40 {
        let written = watcher
            .handle_event(
                &fs_event(FsEventKind::Moved, &format!("/excluded/file{i}")),
                now,
            )
            .unwrap();
        assert_eq!(written, 0);
    }
}

#[test]
fn rename_is_judged_by_destination_name() {
    let fixture = test_context();
    let mut watcher = FileWatcher::new(fixture.store.clone(), &fixture.ctx.config);
    let now = Instant::now();

    for i in 0..6 {
        watcher
            .handle_event(
                &FsEvent {
                    kind: FsEventKind::Moved,
                    path: PathBuf::from(format!("/docs/report{i}.txt")),
                    dest_path: Some(PathBuf::from(format!("/docs/report{i}.txt.locked"))),
                },
                now,
            )
            .unwrap();
    }

    let events = fixture
        .store
        .unresolved_events_since(chrono::Utc::now() - chrono::Duration::hours(1))
        .unwrap();
    assert!(events.iter().any(|e| {
        e.details.as_ref().unwrap()["detector"] == "encryption_patterns"
    }));
}

#[tokio::test]
async fn process_tick_flags_suspicious_and_spares_safe() {
    let fixture = test_context();
    fixture.host.set_processes(vec![
        ProcessInfo {
            pid: 10,
            name: "ransom_helper".to_string(),
            cmdline: String::new(),
            cpu_percent: 1.0,
            memory_percent: 1.0,
            exe: None,
        },
        ProcessInfo {
            pid: 11,
            name: "firefox".to_string(),
            cmdline: "firefox --new-tab".to_string(),
            cpu_percent: 20.0,
            memory_percent: 8.0,
            exe: None,
        },
    ]);

    let watcher = ProcessWatcher::new(fixture.store.clone(), Arc::clone(&fixture.host));
    let written = watcher.tick().await.unwrap();
    assert_eq!(written, 1);

    let events = fixture
        .store
        .unresolved_events_since(chrono::Utc::now() - chrono::Duration::hours(1))
        .unwrap();
    assert_eq!(events[0].event_type, "suspicious_process");
    assert_eq!(events[0].process_name.as_deref(), Some("ransom_helper"));
}

#[tokio::test]
async fn process_tick_flags_high_cpu() {
    let fixture = test_context();
    fixture.host.set_processes(vec![ProcessInfo {
        pid: 12,
        name: "indexer".to_string(),
        cmdline: String::new(),
        cpu_percent: 97.0,
        memory_percent: 5.0,
        exe: None,
    }]);

    let watcher = ProcessWatcher::new(fixture.store.clone(), Arc::clone(&fixture.host));
    watcher.tick().await.unwrap();

    let events = fixture
        .store
        .unresolved_events_since(chrono::Utc::now() - chrono::Duration::hours(1))
        .unwrap();
    assert_eq!(events[0].event_type, "high_resource_usage");
}
