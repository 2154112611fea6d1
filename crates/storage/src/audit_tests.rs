// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn insert_and_list_newest_first() {
    let store = Store::open_in_memory().unwrap();
    store
        .insert_audit("backup_created", Some("backup_1_aa"), None, Some("backup"))
        .unwrap();
    store
        .insert_audit(
            "alert_sent",
            Some("ransomware_detection"),
            Some(&json!({"severity": "critical"})),
            Some("alerts"),
        )
        .unwrap();

    let entries = store.recent_audit(10).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, "alert_sent");
    assert_eq!(entries[1].action, "backup_created");
    assert_eq!(entries[0].details.as_ref().unwrap()["severity"], "critical");
}

#[test]
fn prune_audit_removes_everything_before_cutoff() {
    let store = Store::open_in_memory().unwrap();
    store.insert_audit("a", None, None, None).unwrap();

    let pruned = store
        .prune_audit(Utc::now() + chrono::Duration::seconds(1))
        .unwrap();
    assert_eq!(pruned, 1);
    assert!(store.recent_audit(10).unwrap().is_empty());
}
