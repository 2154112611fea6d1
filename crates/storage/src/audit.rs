// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit log

use chrono::Utc;
use pk_core::AuditEntry;
use rusqlite::{params, Row};
use serde_json::Value;

use crate::store::{parse_timestamp, Store, StoreError};

fn row_to_entry(row: &Row<'_>) -> Result<AuditEntry, StoreError> {
    let id: i64 = row.get(0)?;
    let details_raw: Option<String> = row.get(3)?;
    let timestamp_raw: String = row.get(4)?;

    Ok(AuditEntry {
        id,
        action: row.get(1)?,
        resource: row.get(2)?,
        details: match details_raw {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        },
        timestamp: parse_timestamp(&timestamp_raw, "audit timestamp", id)?,
        category: row.get(5)?,
    })
}

impl Store {
    pub fn insert_audit(
        &self,
        action: &str,
        resource: Option<&str>,
        details: Option<&Value>,
        category: Option<&str>,
    ) -> Result<i64, StoreError> {
        let now = Utc::now();
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO audit_log (action, resource, details, timestamp, category)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    action,
                    resource,
                    details.map(serde_json::to_string).transpose()?,
                    now.to_rfc3339(),
                    category,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        self.append_log_line(
            "audit.log",
            &format!(
                "{} {} {}",
                now.to_rfc3339(),
                action,
                resource.unwrap_or("-")
            ),
        );
        Ok(id)
    }

    /// Most recent audit entries, newest first.
    pub fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, action, resource, details, timestamp, category
                 FROM audit_log ORDER BY timestamp DESC, id DESC LIMIT ?1",
            )?;
            let mut rows = stmt.query(params![limit as i64])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                entries.push(row_to_entry(row)?);
            }
            Ok(entries)
        })
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
