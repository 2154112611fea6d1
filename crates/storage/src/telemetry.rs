// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry cache rows

use pk_core::TelemetrySample;
use rusqlite::{params, Row};
use serde_json::Value;

use crate::store::{parse_timestamp, Store, StoreError};

fn row_to_sample(row: &Row<'_>) -> Result<TelemetrySample, StoreError> {
    let id: i64 = row.get(0)?;
    let timestamp_raw: String = row.get(1)?;
    let network_raw: Option<String> = row.get(5)?;

    Ok(TelemetrySample {
        timestamp: parse_timestamp(&timestamp_raw, "sample timestamp", id)?,
        cpu_percent: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
        memory_percent: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
        disk_percent: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
        network_io: match network_raw {
            Some(raw) => serde_json::from_str(&raw).unwrap_or(Value::Null),
            None => Value::Null,
        },
        processes_count: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
        uptime_seconds: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
        ip_address: row.get(8)?,
    })
}

const SAMPLE_COLUMNS: &str = "id, timestamp, cpu_percent, memory_percent, disk_percent,
                              network_io, processes_count, uptime_seconds, ip_address";

impl Store {
    /// Append one sample to the telemetry cache; returns its row id.
    pub fn insert_sample(&self, sample: &TelemetrySample) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO telemetry_cache
                     (timestamp, cpu_percent, memory_percent, disk_percent,
                      network_io, processes_count, uptime_seconds, ip_address)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    sample.timestamp.to_rfc3339(),
                    sample.cpu_percent,
                    sample.memory_percent,
                    sample.disk_percent,
                    serde_json::to_string(&sample.network_io)?,
                    sample.processes_count,
                    sample.uptime_seconds,
                    sample.ip_address,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// The most recent cached sample, if any.
    pub fn latest_sample(&self) -> Result<Option<TelemetrySample>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SAMPLE_COLUMNS} FROM telemetry_cache
                 ORDER BY timestamp DESC LIMIT 1"
            ))?;
            let mut rows = stmt.query([])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_sample(row)?)),
                None => Ok(None),
            }
        })
    }

    /// Up to `limit` most recent samples, newest first (model training).
    pub fn recent_samples(&self, limit: usize) -> Result<Vec<TelemetrySample>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SAMPLE_COLUMNS} FROM telemetry_cache
                 ORDER BY timestamp DESC LIMIT ?1"
            ))?;
            let mut rows = stmt.query(params![limit as i64])?;
            let mut samples = Vec::new();
            while let Some(row) = rows.next()? {
                samples.push(row_to_sample(row)?);
            }
            Ok(samples)
        })
    }

    pub fn sample_count(&self) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM telemetry_cache", [], |row| row.get(0))?)
        })
    }
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
