// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn store() -> Store {
    Store::open_in_memory().unwrap()
}

#[test]
fn insert_is_idempotent_on_command_id() {
    let store = store();
    assert!(store
        .insert_command("c1", "get_status", &json!({}))
        .unwrap());
    // Duplicate poll response: same id must not register as new
    assert!(!store
        .insert_command("c1", "get_status", &json!({}))
        .unwrap());

    let record = store.command("c1").unwrap().unwrap();
    assert_eq!(record.status, CommandStatus::Received);
}

#[test]
fn terminal_status_sets_result_and_completed_at() {
    let store = store();
    store.insert_command("c1", "backup", &json!({})).unwrap();
    store
        .set_command_status("c1", CommandStatus::Executing, None)
        .unwrap();
    store
        .set_command_status(
            "c1",
            CommandStatus::Completed,
            Some(&json!({"success": true, "backup_id": "backup_1_ff"})),
        )
        .unwrap();

    let record = store.command("c1").unwrap().unwrap();
    assert_eq!(record.status, CommandStatus::Completed);
    assert!(record.completed_at.is_some());
    assert_eq!(record.result.unwrap()["backup_id"], "backup_1_ff");
}

#[test]
fn status_update_for_unknown_command_fails() {
    let store = store();
    let err = store
        .set_command_status("missing", CommandStatus::Failed, None)
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn commands_since_filters_by_time() {
    let store = store();
    store.insert_command("c1", "scan", &json!({})).unwrap();

    let recent = store
        .commands_since(Utc::now() - chrono::Duration::hours(1))
        .unwrap();
    assert_eq!(recent.len(), 1);

    let none = store
        .commands_since(Utc::now() + chrono::Duration::hours(1))
        .unwrap();
    assert!(none.is_empty());
}
