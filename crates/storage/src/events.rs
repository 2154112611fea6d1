// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Security event rows

use chrono::{DateTime, Utc};
use pk_core::{NewSecurityEvent, QueueType, SecurityEvent, Severity};
use rusqlite::{params, Row};
use serde_json::{json, Value};
use tracing::warn;

use crate::store::{parse_timestamp, Store, StoreError};

fn row_to_event(row: &Row<'_>) -> Result<SecurityEvent, StoreError> {
    let id: i64 = row.get(0)?;
    let severity_raw: String = row.get(2)?;
    let details_raw: Option<String> = row.get(5)?;
    let timestamp_raw: String = row.get(6)?;

    let severity = Severity::parse(&severity_raw).ok_or(StoreError::Corrupt {
        what: "severity",
        id,
        value: severity_raw,
    })?;
    let details = match details_raw {
        Some(raw) => Some(serde_json::from_str::<Value>(&raw)?),
        None => None,
    };

    Ok(SecurityEvent {
        id,
        event_type: row.get(1)?,
        severity,
        description: row.get(3)?,
        file_path: row.get(4)?,
        process_name: row.get(7)?,
        details,
        timestamp: parse_timestamp(&timestamp_raw, "event timestamp", id)?,
        resolved: row.get::<_, i64>(8)? != 0,
    })
}

const EVENT_COLUMNS: &str = "id, event_type, severity, description, file_path,
                             details, timestamp, process_name, resolved";

impl Store {
    /// Insert a security event; returns its row id.
    ///
    /// The event is also enqueued for the sync worker: every event is an
    /// outbound fact the backend eventually receives.
    pub fn insert_security_event(&self, event: &NewSecurityEvent) -> Result<i64, StoreError> {
        let now = Utc::now();
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO security_events
                     (event_type, severity, description, file_path, process_name,
                      details, timestamp, resolved)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
                params![
                    event.event_type,
                    event.severity.as_str(),
                    event.description,
                    event.file_path,
                    event.process_name,
                    event
                        .details
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                    now.to_rfc3339(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        self.enqueue(
            QueueType::SecurityEvent,
            &json!({
                "event_type": event.event_type,
                "severity": event.severity,
                "description": event.description,
                "file_path": event.file_path,
                "process_name": event.process_name,
                "details": event.details,
                "timestamp": now.to_rfc3339(),
            }),
            QueueType::SecurityEvent.priority(),
        )?;

        self.append_log_line(
            "security.log",
            &format!(
                "{} [{}] {}: {}",
                now.to_rfc3339(),
                event.severity,
                event.event_type,
                event.description
            ),
        );
        Ok(id)
    }

    /// Unresolved events with a timestamp after `since`, newest first.
    pub fn unresolved_events_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<SecurityEvent>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM security_events
                 WHERE timestamp > ?1 AND resolved = 0
                 ORDER BY timestamp DESC"
            ))?;
            let mut rows = stmt.query(params![since.to_rfc3339()])?;
            let mut events = Vec::new();
            while let Some(row) = rows.next()? {
                events.push(row_to_event(row)?);
            }
            Ok(events)
        })
    }

    /// All events after `since`, newest first (scan summaries).
    pub fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<SecurityEvent>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM security_events
                 WHERE timestamp > ?1
                 ORDER BY timestamp DESC"
            ))?;
            let mut rows = stmt.query(params![since.to_rfc3339()])?;
            let mut events = Vec::new();
            while let Some(row) = rows.next()? {
                events.push(row_to_event(row)?);
            }
            Ok(events)
        })
    }

    /// Count events of one type after `since`.
    pub fn count_events_of_type_since(
        &self,
        event_type: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM security_events
                 WHERE event_type = ?1 AND timestamp > ?2",
                params![event_type, since.to_rfc3339()],
                |row| row.get(0),
            )?)
        })
    }

    /// Count events of one severity after `since`.
    pub fn count_events_of_severity_since(
        &self,
        severity: Severity,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM security_events
                 WHERE severity = ?1 AND timestamp > ?2",
                params![severity.as_str(), since.to_rfc3339()],
                |row| row.get(0),
            )?)
        })
    }

    /// Flip `resolved` so the alert dispatcher never re-emits the event.
    pub fn resolve_event(&self, id: i64) -> Result<(), StoreError> {
        let changed = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE security_events SET resolved = 1 WHERE id = ?1",
                params![id],
            )?)
        })?;
        if changed == 0 {
            warn!(id, "resolve_event: no such event");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
