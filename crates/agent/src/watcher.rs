// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File and process watcher: filesystem events through the sliding-window
//! detectors, plus a periodic process-table scan.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pk_core::Config;
use pk_detect::{default_safe_list, evaluate_process, EventRing, RansomwareConfig};
use pk_sensors::{FsEvent, HostMonitor};
use pk_storage::Store;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::AgentError;

const PROCESS_CHECK_INTERVAL: Duration = Duration::from_secs(30);
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Filesystem half of the watcher
pub struct FileWatcher {
    store: Store,
    ring: EventRing,
    exclude_paths: Vec<String>,
    max_file_size: u64,
    watch_paths: Vec<PathBuf>,
}

impl FileWatcher {
    pub fn new(store: Store, config: &Arc<Mutex<Config>>) -> Self {
        let config = config.lock();
        let ring = EventRing::new(RansomwareConfig {
            suspicious_extensions: config.security.suspicious_extensions.clone(),
            thresholds: Default::default(),
        });
        Self {
            store,
            ring,
            exclude_paths: config.monitoring.exclude_paths.clone(),
            max_file_size: config.security.max_file_size,
            watch_paths: config
                .monitoring
                .file_watch_paths
                .iter()
                .map(PathBuf::from)
                .collect(),
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        if self.watch_paths.is_empty() {
            info!("no file watch paths configured, file watcher idle");
            cancel.cancelled().await;
            return;
        }

        let (watch, mut rx) = match pk_sensors::watch(&self.watch_paths, EVENT_CHANNEL_CAPACITY) {
            Ok(parts) => parts,
            Err(e) => {
                error!(error = %e, "could not start filesystem watch");
                cancel.cancelled().await;
                return;
            }
        };
        // Keep the OS watcher alive for the lifetime of the loop
        let _watch = watch;
        info!(paths = self.watch_paths.len(), "file watcher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    if let Err(e) = self.handle_event(&event, Instant::now()) {
                        error!(error = %e, "failed to process filesystem event");
                    }
                }
            }
        }
        info!("file watcher stopped");
    }

    /// Feed one event through exclusion, size cap and the detectors.
    /// Returns the number of security events written.
    pub fn handle_event(&mut self, event: &FsEvent, now: Instant) -> Result<usize, AgentError> {
        if is_excluded(&event.path, &self.exclude_paths) {
            return Ok(0);
        }
        if let Ok(metadata) = std::fs::metadata(&event.path) {
            if metadata.len() > self.max_file_size {
                return Ok(0);
            }
        }

        // A rename is judged by where the file ended up
        let path = event.dest_path.as_deref().unwrap_or(&event.path);
        let findings = self.ring.record(event.kind, path, now);

        let written = findings.len();
        for finding in findings {
            warn!(detector = finding.detector.as_str(), "ransomware detection fired");
            self.store.insert_security_event(&finding.to_security_event())?;
            self.store.insert_audit(
                "ransomware_alert_triggered",
                Some(finding.detector.as_str()),
                Some(&finding.details),
                Some("security"),
            )?;
        }
        Ok(written)
    }
}

/// `exclude_paths` prefix match; a trailing `*` matches the level below.
fn is_excluded(path: &Path, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| {
        if let Some(base) = pattern
            .strip_suffix("/*")
            .or_else(|| pattern.strip_suffix("\\*"))
        {
            let base = Path::new(base);
            path.starts_with(base) && path != base
        } else {
            path.starts_with(Path::new(pattern))
        }
    })
}

/// Process half of the watcher
pub struct ProcessWatcher<H: HostMonitor> {
    store: Store,
    host: Arc<H>,
    safe_list: HashSet<String>,
}

impl<H: HostMonitor> ProcessWatcher<H> {
    pub fn new(store: Store, host: Arc<H>) -> Self {
        Self {
            store,
            host,
            safe_list: default_safe_list(),
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(PROCESS_CHECK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("process watcher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "process check failed");
                    }
                }
            }
        }
        info!("process watcher stopped");
    }

    /// One enumeration pass. Returns the number of events written.
    pub async fn tick(&self) -> Result<usize, AgentError> {
        let processes = self.host.processes().await?;
        let mut written = 0usize;

        for process in &processes {
            for finding in evaluate_process(process, &self.safe_list) {
                warn!(
                    process = process.name,
                    kind = finding.kind.as_str(),
                    "process flagged"
                );
                self.store
                    .insert_security_event(&finding.to_security_event())?;
                written += 1;
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
