// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync worker: drains the offline queue to the backend in batches.
//!
//! One worker instance drains at a time (in-process flag); items stay
//! `pending` until a drain marks them, so a crash mid-drain leaves them
//! claimable.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use pk_api::Backend;
use pk_core::{QueueItem, QueueStatus, QueueType};
use pk_storage::Store;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::AgentError;

const BATCH_SIZE: usize = 50;
/// After this many consecutive failed ticks, back off to the long delay
const MAX_FAILED_SYNCS: u32 = 5;
const FAILURE_RETRY_DELAY: Duration = Duration::from_secs(60);
const BACKOFF_DELAY: Duration = Duration::from_secs(300);
const PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

const QUEUE_RETENTION_DAYS: i64 = 7;
const AUDIT_RETENTION_DAYS: i64 = 90;
const TELEMETRY_RETENTION_DAYS: i64 = 30;

/// Outcome of one sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Backend reachable, queues drained
    Synced,
    /// Liveness probe failed or another drain was in flight
    Skipped,
}

pub struct SyncWorker<B: Backend> {
    store: Store,
    backend: Arc<B>,
    device_id: String,
    sync_interval: Duration,
    draining: AtomicBool,
    failed_syncs: u32,
    last_prune: Option<Instant>,
}

impl<B: Backend> SyncWorker<B> {
    pub fn new(store: Store, backend: Arc<B>, device_id: String, sync_interval: Duration) -> Self {
        Self {
            store,
            backend,
            device_id,
            sync_interval,
            draining: AtomicBool::new(false),
            failed_syncs: 0,
            last_prune: None,
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            interval_secs = self.sync_interval.as_secs(),
            "sync worker started"
        );
        loop {
            let delay = if self.failed_syncs > MAX_FAILED_SYNCS {
                BACKOFF_DELAY
            } else if self.failed_syncs > 0 {
                FAILURE_RETRY_DELAY
            } else {
                self.sync_interval
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {
                    match self.sync_once().await {
                        Ok(_) => self.failed_syncs = 0,
                        Err(e) => {
                            self.failed_syncs += 1;
                            error!(error = %e, failed_syncs = self.failed_syncs, "sync failed");
                        }
                    }
                }
            }
        }
        info!("sync worker stopped");
    }

    /// One full sync pass: liveness probe, retry sweep, drain each queue
    /// type, periodic retention sweeps.
    pub async fn sync_once(&mut self) -> Result<SyncOutcome, AgentError> {
        if self.draining.swap(true, Ordering::SeqCst) {
            return Ok(SyncOutcome::Skipped);
        }
        let result = self.sync_inner().await;
        self.draining.store(false, Ordering::SeqCst);
        result
    }

    async fn sync_inner(&mut self) -> Result<SyncOutcome, AgentError> {
        if let Err(e) = self.backend.health().await {
            debug!(error = %e, "backend unreachable, skipping sync tick");
            return Ok(SyncOutcome::Skipped);
        }

        let retried = self.store.retry_failed()?;
        if retried > 0 {
            info!(retried, "reset failed queue items for retry");
        }

        self.drain_telemetry().await?;
        self.drain_security_events().await?;
        self.drain_command_results().await?;
        self.drain_backup_uploads().await?;
        self.maybe_prune()?;

        Ok(SyncOutcome::Synced)
    }

    async fn drain_telemetry(&self) -> Result<(), AgentError> {
        let items = self.store.claim(Some(QueueType::Telemetry), BATCH_SIZE)?;
        if items.is_empty() {
            return Ok(());
        }

        let batch: Vec<Value> = items.iter().map(|i| i.payload.clone()).collect();
        match self.backend.telemetry_batch(&self.device_id, &batch).await {
            Ok(()) => {
                self.mark_all(&items, QueueStatus::Completed)?;
                info!(count = items.len(), "synced telemetry batch");
            }
            Err(e) => {
                warn!(error = %e, "telemetry batch failed");
                self.mark_all(&items, QueueStatus::Failed)?;
            }
        }
        Ok(())
    }

    async fn drain_security_events(&self) -> Result<(), AgentError> {
        let items = self.store.claim(Some(QueueType::SecurityEvent), BATCH_SIZE)?;
        if items.is_empty() {
            return Ok(());
        }

        let batch: Vec<Value> = items.iter().map(|i| i.payload.clone()).collect();
        match self
            .backend
            .security_events_batch(&self.device_id, &batch)
            .await
        {
            Ok(()) => {
                self.mark_all(&items, QueueStatus::Completed)?;
                info!(count = items.len(), "synced security events batch");
            }
            Err(e) => {
                warn!(error = %e, "security events batch failed");
                self.mark_all(&items, QueueStatus::Failed)?;
            }
        }
        Ok(())
    }

    /// Command results go out one at a time; the endpoint is per-command.
    async fn drain_command_results(&self) -> Result<(), AgentError> {
        let items = self.store.claim(Some(QueueType::CommandResult), BATCH_SIZE)?;
        for item in items {
            let (Some(command_id), Some(result)) = (
                item.payload.get("command_id").and_then(Value::as_str),
                item.payload.get("result"),
            ) else {
                warn!(id = item.id, "malformed command result payload");
                self.store.mark(item.id, QueueStatus::Failed, None)?;
                continue;
            };

            match self
                .backend
                .post_command_result(&self.device_id, command_id, result)
                .await
            {
                Ok(()) => self.store.mark(item.id, QueueStatus::Completed, None)?,
                Err(e) => {
                    warn!(command_id, error = %e, "command result sync failed");
                    self.store.mark(item.id, QueueStatus::Failed, None)?;
                }
            }
        }
        Ok(())
    }

    async fn drain_backup_uploads(&self) -> Result<(), AgentError> {
        let items = self.store.claim(Some(QueueType::BackupUpload), BATCH_SIZE)?;
        for item in items {
            match self.upload_one(&item).await {
                Ok(()) => self.store.mark(item.id, QueueStatus::Completed, None)?,
                Err(e) => {
                    warn!(id = item.id, error = %e, "backup upload failed");
                    self.store.mark(item.id, QueueStatus::Failed, None)?;
                }
            }
        }
        Ok(())
    }

    async fn upload_one(&self, item: &QueueItem) -> Result<(), AgentError> {
        let backup_id = item
            .payload
            .get("backup_id")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let upload_url = item
            .payload
            .get("upload_url")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let record = self
            .store
            .backup(backup_id)?
            .ok_or(pk_storage::StoreError::NotFound {
                what: "backup",
                id: backup_id.to_string(),
            })?;

        self.backend
            .upload_backup(upload_url, Path::new(&record.backup_path))
            .await?;
        self.store.mark_backup_uploaded(backup_id, upload_url)?;
        info!(backup_id, "backup uploaded");
        Ok(())
    }

    fn mark_all(&self, items: &[QueueItem], status: QueueStatus) -> Result<(), AgentError> {
        for item in items {
            self.store.mark(item.id, status, None)?;
        }
        Ok(())
    }

    fn maybe_prune(&mut self) -> Result<(), AgentError> {
        let due = self
            .last_prune
            .map(|at| at.elapsed() >= PRUNE_INTERVAL)
            .unwrap_or(true);
        if !due {
            return Ok(());
        }
        self.last_prune = Some(Instant::now());

        let now = Utc::now();
        let queue = self
            .store
            .prune_queue(now - chrono::Duration::days(QUEUE_RETENTION_DAYS))?;
        let audit = self
            .store
            .prune_audit(now - chrono::Duration::days(AUDIT_RETENTION_DAYS))?;
        let telemetry = self
            .store
            .prune_telemetry(now - chrono::Duration::days(TELEMETRY_RETENTION_DAYS))?;
        if queue + audit + telemetry > 0 {
            info!(queue, audit, telemetry, "retention sweep pruned rows");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
