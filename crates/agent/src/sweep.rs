// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hourly backup retention sweep

use std::sync::Arc;
use std::time::Duration;

use pk_vault::BackupEngine;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

pub struct RetentionSweeper {
    vault: Arc<BackupEngine>,
    enabled: bool,
}

impl RetentionSweeper {
    pub fn new(vault: Arc<BackupEngine>, enabled: bool) -> Self {
        Self { vault, enabled }
    }

    pub async fn run(self, cancel: CancellationToken) {
        if !self.enabled {
            info!("backup engine disabled in configuration, retention sweep idle");
            cancel.cancelled().await;
            return;
        }

        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("backup retention sweeper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let vault = Arc::clone(&self.vault);
                    let sweep = tokio::task::spawn_blocking(move || vault.sweep_retention()).await;
                    match sweep {
                        Ok(Ok(removed)) if removed > 0 => {
                            info!(removed, "retention sweep removed old backups");
                        }
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => error!(error = %e, "retention sweep failed"),
                        Err(e) => error!(error = %e, "retention sweep panicked"),
                    }
                }
            }
        }
        info!("backup retention sweeper stopped");
    }
}
