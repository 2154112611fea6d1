// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable offline queue operations

use chrono::Utc;
use pk_core::{QueueItem, QueueStatus, QueueType};
use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;

use crate::store::{parse_timestamp, Store, StoreError};

const DEFAULT_MAX_RETRIES: i64 = 3;

fn row_to_item(row: &Row<'_>) -> Result<QueueItem, StoreError> {
    let id: i64 = row.get(0)?;
    let queue_type_raw: String = row.get(1)?;
    let payload_raw: String = row.get(2)?;
    let created_raw: String = row.get(4)?;
    let status_raw: String = row.get(7)?;

    let queue_type = QueueType::parse(&queue_type_raw).ok_or(StoreError::Corrupt {
        what: "queue_type",
        id,
        value: queue_type_raw,
    })?;
    let status = QueueStatus::parse(&status_raw).ok_or(StoreError::Corrupt {
        what: "queue status",
        id,
        value: status_raw,
    })?;
    let payload: Value = serde_json::from_str(&payload_raw)?;

    Ok(QueueItem {
        id,
        queue_type,
        payload,
        priority: row.get(3)?,
        created_at: parse_timestamp(&created_raw, "queue created_at", id)?,
        retry_count: row.get(5)?,
        max_retries: row.get(6)?,
        status,
    })
}

impl Store {
    /// Atomically insert a pending queue item; returns its row id.
    pub fn enqueue(
        &self,
        queue_type: QueueType,
        payload: &Value,
        priority: i64,
    ) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO offline_queue
                     (queue_type, payload, priority, created_at, max_retries, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending')",
                params![
                    queue_type.as_str(),
                    serde_json::to_string(payload)?,
                    priority,
                    Utc::now().to_rfc3339(),
                    DEFAULT_MAX_RETRIES,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Fetch up to `limit` pending items, highest priority first, oldest
    /// first within a priority. Rows are left pending: the sync worker is
    /// single-flight, and anything interrupted mid-drain stays claimable.
    pub fn claim(
        &self,
        queue_type: Option<QueueType>,
        limit: usize,
    ) -> Result<Vec<QueueItem>, StoreError> {
        self.with_conn(|conn| {
            let mut items = Vec::new();
            match queue_type {
                Some(qt) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, queue_type, payload, priority, created_at,
                                retry_count, max_retries, status
                         FROM offline_queue
                         WHERE queue_type = ?1 AND status = 'pending'
                         ORDER BY priority DESC, created_at ASC
                         LIMIT ?2",
                    )?;
                    let mut rows = stmt.query(params![qt.as_str(), limit as i64])?;
                    while let Some(row) = rows.next()? {
                        items.push(row_to_item(row)?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, queue_type, payload, priority, created_at,
                                retry_count, max_retries, status
                         FROM offline_queue
                         WHERE status = 'pending'
                         ORDER BY priority DESC, created_at ASC
                         LIMIT ?1",
                    )?;
                    let mut rows = stmt.query(params![limit as i64])?;
                    while let Some(row) = rows.next()? {
                        items.push(row_to_item(row)?);
                    }
                }
            }
            Ok(items)
        })
    }

    /// Set a terminal status, bump the retry counter, and optionally merge a
    /// `result` object into the stored payload.
    pub fn mark(
        &self,
        id: i64,
        status: QueueStatus,
        result: Option<&Value>,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE offline_queue
                 SET status = ?1, retry_count = retry_count + 1
                 WHERE id = ?2",
                params![status.as_str(), id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound {
                    what: "queue item",
                    id: id.to_string(),
                });
            }

            if let Some(result) = result {
                let payload_raw: Option<String> = conn
                    .query_row(
                        "SELECT payload FROM offline_queue WHERE id = ?1",
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(payload_raw) = payload_raw {
                    let mut payload: Value = serde_json::from_str(&payload_raw)?;
                    if let Some(map) = payload.as_object_mut() {
                        map.insert("result".to_string(), result.clone());
                    }
                    conn.execute(
                        "UPDATE offline_queue SET payload = ?1 WHERE id = ?2",
                        params![serde_json::to_string(&payload)?, id],
                    )?;
                }
            }
            Ok(())
        })
    }

    /// Reset failed items still under their retry cap back to pending.
    ///
    /// Invoked by the sync worker's periodic sweep. Resets `retry_count`
    /// to 0, which makes `max_retries` a per-sweep cap.
    pub fn retry_failed(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE offline_queue
                 SET status = 'pending', retry_count = 0
                 WHERE status = 'failed' AND retry_count < max_retries",
                [],
            )?)
        })
    }

    /// Count pending items, optionally for one queue type.
    pub fn pending_count(&self, queue_type: Option<QueueType>) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            let count = match queue_type {
                Some(qt) => conn.query_row(
                    "SELECT COUNT(*) FROM offline_queue
                     WHERE queue_type = ?1 AND status = 'pending'",
                    params![qt.as_str()],
                    |row| row.get(0),
                )?,
                None => conn.query_row(
                    "SELECT COUNT(*) FROM offline_queue WHERE status = 'pending'",
                    [],
                    |row| row.get(0),
                )?,
            };
            Ok(count)
        })
    }

    /// Fetch one queue item by id (tests and inspection).
    pub fn queue_item(&self, id: i64) -> Result<Option<QueueItem>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, queue_type, payload, priority, created_at,
                        retry_count, max_retries, status
                 FROM offline_queue WHERE id = ?1",
            )?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_item(row)?)),
                None => Ok(None),
            }
        })
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
