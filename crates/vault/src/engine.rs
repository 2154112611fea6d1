// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup engine: create, restore, retention.
//!
//! One long-lived engine is shared by the command handlers and the
//! retention sweep; it owns the backup directory.

use std::path::{Path, PathBuf};

use chrono::Utc;
use pk_core::{token_hex, BackupRecord, BackupType};
use pk_storage::{Store, StoreError};
use thiserror::Error;
use tracing::{info, warn};

use crate::archive;
use crate::crypto::{self, CryptoError, KEY_SIZE};

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("no valid source paths for backup")]
    NoValidPaths,

    #[error("backup too large: {size} bytes (max: {max})")]
    TooLarge { size: u64, max: u64 },

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("backup not found: {0}")]
    NotFound(String),

    #[error("backup artifact missing: {0}")]
    MissingArtifact(PathBuf),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Engine configuration, straight from the `[backup]` config section
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub backup_dir: PathBuf,
    pub encryption_key_hex: String,
    pub compression_level: u32,
    pub max_backup_size: u64,
    pub retention_days: i64,
}

pub struct BackupEngine {
    store: Store,
    backup_dir: PathBuf,
    key: [u8; KEY_SIZE],
    compression_level: u32,
    max_backup_size: u64,
    retention_days: i64,
}

impl BackupEngine {
    pub fn new(store: Store, config: EngineConfig) -> Result<Self, VaultError> {
        std::fs::create_dir_all(&config.backup_dir)?;
        Ok(Self {
            store,
            key: crypto::derive_key(&config.encryption_key_hex)?,
            backup_dir: config.backup_dir,
            compression_level: config.compression_level,
            max_backup_size: config.max_backup_size,
            retention_days: config.retention_days,
        })
    }

    /// Create an encrypted backup of `source_paths`.
    ///
    /// Nonexistent paths are dropped with a warning; an empty remainder is
    /// an error. The compressed intermediate is size-capped before
    /// encryption.
    pub fn create(
        &self,
        source_paths: &[String],
        backup_type: BackupType,
        description: &str,
    ) -> Result<BackupRecord, VaultError> {
        let valid: Vec<PathBuf> = source_paths
            .iter()
            .map(PathBuf::from)
            .filter(|p| {
                let exists = p.exists();
                if !exists {
                    warn!(path = %p.display(), "source path does not exist, dropping");
                }
                exists
            })
            .collect();
        if valid.is_empty() {
            return Err(VaultError::NoValidPaths);
        }

        let backup_id = format!("backup_{}_{}", Utc::now().timestamp(), token_hex(4));
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let artifact = self
            .backup_dir
            .join(format!("{backup_id}_{timestamp}.tar.gz.enc"));
        let intermediate = self.backup_dir.join(format!(".{backup_id}.tar.gz"));

        let result = self.create_inner(&valid, &intermediate, &artifact);
        // The intermediate never outlives the call, success or not
        let _ = std::fs::remove_file(&intermediate);
        let (size_bytes, checksum) = match result {
            Ok(parts) => parts,
            Err(e) => {
                let _ = std::fs::remove_file(&artifact);
                return Err(e);
            }
        };

        let record = BackupRecord {
            backup_id: backup_id.clone(),
            backup_type,
            source_paths: valid.iter().map(|p| p.display().to_string()).collect(),
            backup_path: artifact.display().to_string(),
            size_bytes: size_bytes as i64,
            encrypted: true,
            checksum,
            description: description.to_string(),
            created_at: Utc::now(),
            uploaded: false,
            upload_url: None,
        };
        self.store.insert_backup(&record)?;
        self.store.insert_audit(
            "backup_created",
            Some(&backup_id),
            Some(&serde_json::json!({
                "backup_type": backup_type.as_str(),
                "size_bytes": size_bytes,
                "sources": record.source_paths,
            })),
            Some("backup"),
        )?;

        info!(backup_id, size_bytes, "backup created");
        Ok(record)
    }

    fn create_inner(
        &self,
        sources: &[PathBuf],
        intermediate: &Path,
        artifact: &Path,
    ) -> Result<(u64, String), VaultError> {
        let refs: Vec<&Path> = sources.iter().map(PathBuf::as_path).collect();
        archive::build(&refs, intermediate, self.compression_level)?;

        let size = std::fs::metadata(intermediate)?.len();
        if size > self.max_backup_size {
            return Err(VaultError::TooLarge {
                size,
                max: self.max_backup_size,
            });
        }

        let plaintext = std::fs::read(intermediate)?;
        let envelope = crypto::encrypt(&self.key, &plaintext)?;
        std::fs::write(artifact, envelope)?;

        let checksum = crypto::sha256_hex(artifact)?;
        Ok((std::fs::metadata(artifact)?.len(), checksum))
    }

    /// Restore a backup into `restore_path` (default `./restore`).
    ///
    /// Refuses to touch the filesystem when the stored checksum no longer
    /// matches the artifact or when decryption fails.
    pub fn restore(
        &self,
        backup_id: &str,
        restore_path: Option<&Path>,
    ) -> Result<PathBuf, VaultError> {
        let record = self
            .store
            .backup(backup_id)?
            .ok_or_else(|| VaultError::NotFound(backup_id.to_string()))?;

        let artifact = PathBuf::from(&record.backup_path);
        if !artifact.exists() {
            return Err(VaultError::MissingArtifact(artifact));
        }

        if !record.checksum.is_empty() {
            let actual = crypto::sha256_hex(&artifact)?;
            if actual != record.checksum {
                return Err(VaultError::ChecksumMismatch {
                    expected: record.checksum,
                    actual,
                });
            }
        }

        let envelope = std::fs::read(&artifact)?;
        let plaintext = crypto::decrypt(&self.key, &envelope)?;

        let intermediate = self.backup_dir.join(format!(".{backup_id}.restore.tar.gz"));
        std::fs::write(&intermediate, plaintext)?;

        let dest = restore_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("./restore"));
        let extracted = archive::extract(&intermediate, &dest);
        let _ = std::fs::remove_file(&intermediate);
        extracted?;

        self.store.insert_audit(
            "backup_restored",
            Some(backup_id),
            Some(&serde_json::json!({
                "backup_path": record.backup_path,
                "restore_path": dest.display().to_string(),
                "backup_type": record.backup_type.as_str(),
            })),
            Some("backup"),
        )?;

        info!(backup_id, dest = %dest.display(), "backup restored");
        Ok(dest)
    }

    /// Delete backups past retention that have been uploaded; never-uploaded
    /// records stay. Returns the number of backups removed.
    pub fn sweep_retention(&self) -> Result<usize, VaultError> {
        let cutoff = Utc::now() - chrono::Duration::days(self.retention_days);
        let candidates = self.store.uploaded_backups_before(cutoff)?;
        let mut removed = 0usize;

        for record in candidates {
            let path = PathBuf::from(&record.backup_path);
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(backup_id = record.backup_id, error = %e, "could not delete artifact");
                    continue;
                }
            }
            self.store.delete_backup_record(&record.backup_id)?;
            info!(backup_id = record.backup_id, "old backup deleted");
            removed += 1;
        }
        Ok(removed)
    }

    /// Delete one backup and its artifact.
    pub fn delete(&self, backup_id: &str) -> Result<(), VaultError> {
        let record = self
            .store
            .backup(backup_id)?
            .ok_or_else(|| VaultError::NotFound(backup_id.to_string()))?;

        let path = PathBuf::from(&record.backup_path);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        self.store.delete_backup_record(backup_id)?;
        Ok(())
    }

    pub fn list(&self, limit: usize) -> Result<Vec<BackupRecord>, VaultError> {
        Ok(self.store.list_backups(limit)?)
    }

    pub fn info(&self, backup_id: &str) -> Result<Option<BackupRecord>, VaultError> {
        Ok(self.store.backup(backup_id)?)
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
