// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup record rows

use chrono::{DateTime, Utc};
use pk_core::{BackupRecord, BackupType};
use rusqlite::{params, Row};

use crate::store::{parse_timestamp, Store, StoreError};

fn row_to_backup(row: &Row<'_>) -> Result<BackupRecord, StoreError> {
    let id: i64 = row.get(0)?;
    let backup_type_raw: String = row.get(2)?;
    let source_paths_raw: String = row.get(3)?;
    let created_raw: String = row.get(8)?;

    let backup_type = BackupType::parse(&backup_type_raw).ok_or(StoreError::Corrupt {
        what: "backup_type",
        id,
        value: backup_type_raw,
    })?;

    Ok(BackupRecord {
        backup_id: row.get(1)?,
        backup_type,
        source_paths: serde_json::from_str(&source_paths_raw)?,
        backup_path: row.get(4)?,
        size_bytes: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
        encrypted: row.get::<_, i64>(6)? != 0,
        checksum: row.get(7)?,
        created_at: parse_timestamp(&created_raw, "backup created_at", id)?,
        uploaded: row.get::<_, i64>(9)? != 0,
        upload_url: row.get(10)?,
        description: row.get(11)?,
    })
}

const BACKUP_COLUMNS: &str = "id, backup_id, backup_type, source_paths, backup_path,
                              size_bytes, encrypted, checksum, created_at, uploaded,
                              upload_url, description";

impl Store {
    pub fn insert_backup(&self, record: &BackupRecord) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO backup_records
                     (backup_id, backup_type, source_paths, backup_path, size_bytes,
                      encrypted, checksum, description, created_at, uploaded, upload_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.backup_id,
                    record.backup_type.as_str(),
                    serde_json::to_string(&record.source_paths)?,
                    record.backup_path,
                    record.size_bytes,
                    record.encrypted as i64,
                    record.checksum,
                    record.description,
                    record.created_at.to_rfc3339(),
                    record.uploaded as i64,
                    record.upload_url,
                ],
            )?;
            Ok(())
        })
    }

    pub fn backup(&self, backup_id: &str) -> Result<Option<BackupRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BACKUP_COLUMNS} FROM backup_records WHERE backup_id = ?1"
            ))?;
            let mut rows = stmt.query(params![backup_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_backup(row)?)),
                None => Ok(None),
            }
        })
    }

    pub fn list_backups(&self, limit: usize) -> Result<Vec<BackupRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BACKUP_COLUMNS} FROM backup_records
                 ORDER BY created_at DESC LIMIT ?1"
            ))?;
            let mut rows = stmt.query(params![limit as i64])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_backup(row)?);
            }
            Ok(records)
        })
    }

    /// Uploaded backups created before `cutoff` (retention candidates).
    pub fn uploaded_backups_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<BackupRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BACKUP_COLUMNS} FROM backup_records
                 WHERE created_at < ?1 AND uploaded = 1"
            ))?;
            let mut rows = stmt.query(params![cutoff.to_rfc3339()])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_backup(row)?);
            }
            Ok(records)
        })
    }

    pub fn mark_backup_uploaded(&self, backup_id: &str, url: &str) -> Result<(), StoreError> {
        let changed = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE backup_records SET uploaded = 1, upload_url = ?1 WHERE backup_id = ?2",
                params![url, backup_id],
            )?)
        })?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                what: "backup",
                id: backup_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn delete_backup_record(&self, backup_id: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM backup_records WHERE backup_id = ?1",
                params![backup_id],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
#[path = "backups_tests.rs"]
mod tests;
