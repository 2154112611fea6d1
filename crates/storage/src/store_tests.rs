// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pk_core::{QueueStatus, QueueType};
use serde_json::json;

#[test]
fn open_creates_database_file_and_parents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("agent.db");
    let _store = Store::open(&path).unwrap();
    assert!(path.exists());
}

#[test]
fn open_missing_parent_of_unwritable_root_fails() {
    let err = Store::open("/proc/definitely/not/writable/agent.db").unwrap_err();
    match err {
        StoreError::Io(_) | StoreError::Open { .. } => {}
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn reopen_requeues_processing_items() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.db");

    {
        let store = Store::open(&path).unwrap();
        let id = store.enqueue(QueueType::Telemetry, &json!({}), 1).unwrap();
        // Simulate a worker that died mid-drain
        store
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE offline_queue SET status = 'processing' WHERE id = ?1",
                    [id],
                )?;
                Ok(())
            })
            .unwrap();
    }

    let store = Store::open(&path).unwrap();
    let items = store.claim(Some(QueueType::Telemetry), 10).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].status, QueueStatus::Pending);
}

#[test]
fn clones_share_the_same_database() {
    let store = Store::open_in_memory().unwrap();
    let clone = store.clone();

    store.enqueue(QueueType::Telemetry, &json!({}), 1).unwrap();
    assert_eq!(clone.pending_count(None).unwrap(), 1);
}
