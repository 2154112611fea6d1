// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command history rows.
//!
//! `command_id` is unique at the schema level; `insert_command` reports
//! whether the row is new, which is what makes duplicate poll responses
//! execute at most once.

use chrono::{DateTime, Utc};
use pk_core::{CommandRecord, CommandStatus};
use rusqlite::{params, Row};
use serde_json::Value;

use crate::store::{parse_timestamp, Store, StoreError};

fn row_to_command(row: &Row<'_>) -> Result<CommandRecord, StoreError> {
    let id: i64 = row.get(0)?;
    let parameters_raw: Option<String> = row.get(3)?;
    let status_raw: String = row.get(4)?;
    let result_raw: Option<String> = row.get(5)?;
    let created_raw: String = row.get(6)?;
    let completed_raw: Option<String> = row.get(7)?;

    let status = CommandStatus::parse(&status_raw).ok_or(StoreError::Corrupt {
        what: "command status",
        id,
        value: status_raw,
    })?;

    Ok(CommandRecord {
        command_id: row.get(1)?,
        command_type: row.get(2)?,
        parameters: match parameters_raw {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Value::Null,
        },
        status,
        result: match result_raw {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        },
        created_at: parse_timestamp(&created_raw, "command created_at", id)?,
        completed_at: match completed_raw {
            Some(raw) => Some(parse_timestamp(&raw, "command completed_at", id)?),
            None => None,
        },
    })
}

const COMMAND_COLUMNS: &str =
    "id, command_id, command_type, parameters, status, result, created_at, completed_at";

impl Store {
    /// Record a newly received command. Returns `false` when the id was
    /// already present, in which case the caller must not execute it again.
    pub fn insert_command(
        &self,
        command_id: &str,
        command_type: &str,
        parameters: &Value,
    ) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO command_history
                     (command_id, command_type, parameters, status, created_at)
                 VALUES (?1, ?2, ?3, 'received', ?4)",
                params![
                    command_id,
                    command_type,
                    serde_json::to_string(parameters)?,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(inserted > 0)
        })
    }

    /// Advance a command's status; terminal statuses also set `completed_at`
    /// and persist the result blob.
    pub fn set_command_status(
        &self,
        command_id: &str,
        status: CommandStatus,
        result: Option<&Value>,
    ) -> Result<(), StoreError> {
        let terminal = matches!(status, CommandStatus::Completed | CommandStatus::Failed);
        let changed = self.with_conn(|conn| {
            let changed = if terminal {
                conn.execute(
                    "UPDATE command_history
                     SET status = ?1, result = ?2, completed_at = ?3
                     WHERE command_id = ?4",
                    params![
                        status.as_str(),
                        result.map(serde_json::to_string).transpose()?,
                        Utc::now().to_rfc3339(),
                        command_id,
                    ],
                )?
            } else {
                conn.execute(
                    "UPDATE command_history SET status = ?1 WHERE command_id = ?2",
                    params![status.as_str(), command_id],
                )?
            };
            Ok(changed)
        })?;

        if changed == 0 {
            return Err(StoreError::NotFound {
                what: "command",
                id: command_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn command(&self, command_id: &str) -> Result<Option<CommandRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COMMAND_COLUMNS} FROM command_history WHERE command_id = ?1"
            ))?;
            let mut rows = stmt.query(params![command_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_command(row)?)),
                None => Ok(None),
            }
        })
    }

    /// Commands created after `since`, newest first (alerting and status).
    pub fn commands_since(&self, since: DateTime<Utc>) -> Result<Vec<CommandRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COMMAND_COLUMNS} FROM command_history
                 WHERE created_at > ?1
                 ORDER BY created_at DESC"
            ))?;
            let mut rows = stmt.query(params![since.to_rfc3339()])?;
            let mut commands = Vec::new();
            while let Some(row) = rows.next()? {
                commands.push(row_to_command(row)?);
            }
            Ok(commands)
        })
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
