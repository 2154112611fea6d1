// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup round-trip and checksum integrity.

use crate::prelude::{fixture, write_tree};
use pk_core::BackupType;
use pk_vault::VaultError;
use std::path::Path;

#[test]
fn backup_and_restore_yield_identical_files() {
    let fx = fixture();
    let source = fx.dir.path().join("docs");
    write_tree(
        &source,
        &[
            ("contract.pdf", "pdf bytes"),
            ("notes/meeting.txt", "minutes"),
            ("ledger.csv", "a,b,c"),
        ],
    );

    let record = fx
        .vault
        .create(&[source.display().to_string()], BackupType::Manual, "spec")
        .unwrap();

    let restore_to = fx.dir.path().join("restored");
    fx.vault
        .restore(&record.backup_id, Some(&restore_to))
        .unwrap();

    for (name, content) in [
        ("docs/contract.pdf", "pdf bytes"),
        ("docs/notes/meeting.txt", "minutes"),
        ("docs/ledger.csv", "a,b,c"),
    ] {
        assert_eq!(
            std::fs::read_to_string(restore_to.join(name)).unwrap(),
            content,
            "mismatch for {name}"
        );
    }
}

#[test]
fn corrupted_ciphertext_is_refused_and_disk_untouched() {
    let fx = fixture();
    let source = fx.dir.path().join("docs");
    write_tree(
        &source,
        &[("a.txt", "alpha"), ("b.txt", "beta"), ("c.txt", "gamma")],
    );

    let record = fx
        .vault
        .create(&[source.display().to_string()], BackupType::Manual, "")
        .unwrap();

    // Corrupt one byte of the ciphertext
    let mut bytes = std::fs::read(&record.backup_path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xff;
    std::fs::write(&record.backup_path, &bytes).unwrap();

    let restore_to = fx.dir.path().join("restored");
    let err = fx
        .vault
        .restore(&record.backup_id, Some(&restore_to))
        .unwrap_err();
    assert!(matches!(err, VaultError::ChecksumMismatch { .. }));
    assert!(!restore_to.exists());
    // Source files untouched
    assert_eq!(
        std::fs::read_to_string(source.join("a.txt")).unwrap(),
        "alpha"
    );
}

#[test]
fn restored_artifact_checksum_matches_record() {
    let fx = fixture();
    let source = fx.dir.path().join("docs");
    write_tree(&source, &[("a.txt", "alpha")]);

    let record = fx
        .vault
        .create(&[source.display().to_string()], BackupType::Scheduled, "")
        .unwrap();
    let stored = fx.store.backup(&record.backup_id).unwrap().unwrap();

    assert_eq!(stored.checksum, record.checksum);
    assert!(Path::new(&stored.backup_path).exists());
    assert!(stored.encrypted);
}
