// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store handle, schema creation and retention sweeps

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use thiserror::Error;
use tracing::{debug, info};

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("unreadable {what} in row {id}: {value:?}")]
    Corrupt {
        what: &'static str,
        id: i64,
        value: String,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to the embedded store.
///
/// Cheap to clone; all clones share one serialized connection. The busy
/// timeout covers transient lock contention from concurrent subsystems.
#[derive(Clone, Debug)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    log_dir: Option<PathBuf>,
}

impl Store {
    /// Open (and create if needed) the database at `path`.
    ///
    /// Failure here is the only fatal startup error in the agent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let store = Self::init(conn)?;
        info!(path = %path.display(), "store opened");
        Ok(store)
    }

    /// Open an in-memory store (tests and one-shot tooling).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        // journal_mode returns the resulting mode as a row
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        create_tables(&conn)?;

        // Items left mid-drain by a crashed worker become claimable again
        let requeued = conn.execute(
            "UPDATE offline_queue SET status = 'pending' WHERE status = 'processing'",
            [],
        )?;
        if requeued > 0 {
            info!(requeued, "requeued items left processing by a previous run");
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            log_dir: None,
        })
    }

    /// Mirror security events and audit rows as lines under `dir`
    /// (`security.log` / `audit.log`), so `get_logs` can tail them.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Best-effort append of one line to `<log_dir>/<file>`.
    pub(crate) fn append_log_line(&self, file: &str, line: &str) {
        let Some(dir) = &self.log_dir else {
            return;
        };
        use std::io::Write;
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(file))
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = result {
            debug!(file, error = %e, "failed to mirror log line");
        }
    }

    /// Delete queue rows that reached a terminal status before `cutoff`.
    pub fn prune_queue(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM offline_queue
                 WHERE status IN ('completed', 'failed') AND created_at < ?1",
                [cutoff.to_rfc3339()],
            )?)
        })
    }

    /// Delete audit rows older than `cutoff`.
    pub fn prune_audit(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM audit_log WHERE timestamp < ?1",
                [cutoff.to_rfc3339()],
            )?)
        })
    }

    /// Delete cached telemetry rows older than `cutoff`.
    pub fn prune_telemetry(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM telemetry_cache WHERE timestamp < ?1",
                [cutoff.to_rfc3339()],
            )?)
        })
    }
}

pub(crate) fn parse_timestamp(
    raw: &str,
    what: &'static str,
    id: i64,
) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt {
            what,
            id,
            value: raw.to_string(),
        })
}

fn create_tables(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS device_registration (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id TEXT UNIQUE NOT NULL,
            org_id TEXT,
            api_key TEXT,
            registered_at TEXT,
            last_heartbeat TEXT,
            status TEXT NOT NULL DEFAULT 'active'
        );

        CREATE TABLE IF NOT EXISTS offline_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            queue_type TEXT NOT NULL,
            payload TEXT NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            max_retries INTEGER NOT NULL DEFAULT 3,
            status TEXT NOT NULL DEFAULT 'pending'
        );

        CREATE INDEX IF NOT EXISTS idx_queue_drain
            ON offline_queue (queue_type, status, priority DESC, created_at ASC);

        CREATE TABLE IF NOT EXISTS telemetry_cache (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            cpu_percent REAL,
            memory_percent REAL,
            disk_percent REAL,
            network_io TEXT,
            processes_count INTEGER,
            uptime_seconds INTEGER,
            ip_address TEXT
        );

        CREATE TABLE IF NOT EXISTS security_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_type TEXT NOT NULL,
            severity TEXT NOT NULL,
            description TEXT NOT NULL,
            file_path TEXT,
            process_name TEXT,
            details TEXT,
            timestamp TEXT NOT NULL,
            resolved INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_events_recent
            ON security_events (timestamp, resolved);

        CREATE TABLE IF NOT EXISTS backup_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            backup_id TEXT UNIQUE NOT NULL,
            backup_type TEXT NOT NULL,
            source_paths TEXT NOT NULL,
            backup_path TEXT NOT NULL,
            size_bytes INTEGER,
            encrypted INTEGER NOT NULL DEFAULT 1,
            checksum TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            uploaded INTEGER NOT NULL DEFAULT 0,
            upload_url TEXT
        );

        CREATE TABLE IF NOT EXISTS command_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            command_id TEXT UNIQUE NOT NULL,
            command_type TEXT NOT NULL,
            parameters TEXT,
            status TEXT NOT NULL,
            result TEXT,
            created_at TEXT NOT NULL,
            completed_at TEXT
        );

        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            action TEXT NOT NULL,
            resource TEXT,
            details TEXT,
            timestamp TEXT NOT NULL,
            category TEXT
        );
        ",
    )
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
