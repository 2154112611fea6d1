// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device registration row

use chrono::Utc;
use pk_core::{Registration, RegistrationStatus};
use rusqlite::{params, Row};

use crate::store::{parse_timestamp, Store, StoreError};

fn row_to_registration(row: &Row<'_>) -> Result<Registration, StoreError> {
    let id: i64 = row.get(0)?;
    let registered_raw: Option<String> = row.get(4)?;
    let heartbeat_raw: Option<String> = row.get(5)?;
    let status_raw: String = row.get(6)?;

    let status = RegistrationStatus::parse(&status_raw).ok_or(StoreError::Corrupt {
        what: "registration status",
        id,
        value: status_raw,
    })?;

    Ok(Registration {
        device_id: row.get(1)?,
        org_id: row.get(2)?,
        api_key: row.get(3)?,
        registered_at: match registered_raw {
            Some(raw) => Some(parse_timestamp(&raw, "registered_at", id)?),
            None => None,
        },
        last_heartbeat: match heartbeat_raw {
            Some(raw) => Some(parse_timestamp(&raw, "last_heartbeat", id)?),
            None => None,
        },
        status,
    })
}

impl Store {
    /// Insert or replace the registration row for this device.
    pub fn save_registration(&self, registration: &Registration) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO device_registration
                     (device_id, org_id, api_key, registered_at, last_heartbeat, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    registration.device_id,
                    registration.org_id,
                    registration.api_key,
                    registration.registered_at.map(|t| t.to_rfc3339()),
                    registration.last_heartbeat.map(|t| t.to_rfc3339()),
                    registration.status.as_str(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn registration(&self, device_id: &str) -> Result<Option<Registration>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, device_id, org_id, api_key, registered_at, last_heartbeat, status
                 FROM device_registration WHERE device_id = ?1",
            )?;
            let mut rows = stmt.query(params![device_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_registration(row)?)),
                None => Ok(None),
            }
        })
    }

    /// Update `last_heartbeat` to now. Written directly by the telemetry
    /// sampler after a successful heartbeat POST.
    pub fn touch_heartbeat(&self, device_id: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE device_registration SET last_heartbeat = ?1 WHERE device_id = ?2",
                params![Utc::now().to_rfc3339(), device_id],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
#[path = "registration_tests.rs"]
mod tests;
