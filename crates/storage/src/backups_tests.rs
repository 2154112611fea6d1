// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn record(backup_id: &str, age_days: i64, uploaded: bool) -> BackupRecord {
    BackupRecord {
        backup_id: backup_id.to_string(),
        backup_type: BackupType::Command,
        source_paths: vec!["/srv/docs".to_string()],
        backup_path: format!("/backups/{backup_id}.tar.gz.enc"),
        size_bytes: 4096,
        encrypted: true,
        checksum: "ab".repeat(32),
        description: "test".to_string(),
        created_at: Utc::now() - chrono::Duration::days(age_days),
        uploaded,
        upload_url: None,
    }
}

#[test]
fn insert_and_fetch_round_trip() {
    let store = Store::open_in_memory().unwrap();
    store.insert_backup(&record("backup_1_aa", 0, false)).unwrap();

    let back = store.backup("backup_1_aa").unwrap().unwrap();
    assert_eq!(back.backup_type, BackupType::Command);
    assert_eq!(back.source_paths, vec!["/srv/docs".to_string()]);
    assert!(back.encrypted);
    assert!(!back.uploaded);
}

#[test]
fn duplicate_backup_id_rejected() {
    let store = Store::open_in_memory().unwrap();
    store.insert_backup(&record("backup_1_aa", 0, false)).unwrap();
    assert!(store.insert_backup(&record("backup_1_aa", 0, false)).is_err());
}

#[test]
fn mark_uploaded_sets_flag_and_url() {
    let store = Store::open_in_memory().unwrap();
    store.insert_backup(&record("backup_1_aa", 0, false)).unwrap();

    store
        .mark_backup_uploaded("backup_1_aa", "https://storage/signed")
        .unwrap();
    let back = store.backup("backup_1_aa").unwrap().unwrap();
    assert!(back.uploaded);
    assert_eq!(back.upload_url.as_deref(), Some("https://storage/signed"));
}

#[test]
fn retention_candidates_require_uploaded_and_old() {
    let store = Store::open_in_memory().unwrap();
    store.insert_backup(&record("old_uploaded", 40, true)).unwrap();
    store.insert_backup(&record("old_local", 40, false)).unwrap();
    store.insert_backup(&record("fresh_uploaded", 1, true)).unwrap();

    let cutoff = Utc::now() - chrono::Duration::days(30);
    let candidates = store.uploaded_backups_before(cutoff).unwrap();
    let ids: Vec<&str> = candidates.iter().map(|r| r.backup_id.as_str()).collect();
    assert_eq!(ids, vec!["old_uploaded"]);
}

#[test]
fn delete_removes_record() {
    let store = Store::open_in_memory().unwrap();
    store.insert_backup(&record("backup_1_aa", 0, false)).unwrap();
    store.delete_backup_record("backup_1_aa").unwrap();
    assert!(store.backup("backup_1_aa").unwrap().is_none());
}
