// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Offline buffering: samples queue while the backend is down and drain
//! to completion once it returns.

use crate::prelude::{fixture, snapshot};
use pk_agent::{Sampler, SyncWorker};
use pk_core::{QueueStatus, QueueType};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn twenty_offline_samples_all_complete_after_one_sync() {
    let fx = fixture();
    fx.backend.set_offline(true);
    fx.host.set_snapshot(snapshot(20.0, 40.0, 50.0));

    // Twenty sampler ticks with the backend unreachable
    let sampler = Sampler::new(fx.ctx.clone());
    for _ in 0..20 {
        sampler.tick().await.unwrap();
    }
    assert_eq!(
        fx.store.pending_count(Some(QueueType::Telemetry)).unwrap(),
        20
    );
    assert!(fx.backend.heartbeats().is_empty());

    // Backend comes back; one sync interval drains everything
    fx.backend.set_offline(false);
    let mut worker = SyncWorker::new(
        fx.store.clone(),
        Arc::clone(&fx.backend),
        fx.ctx.device_id.clone(),
        Duration::from_secs(300),
    );
    worker.sync_once().await.unwrap();

    assert_eq!(fx.store.pending_count(None).unwrap(), 0);
    let batches = fx.backend.telemetry_batches();
    let total: usize = batches.iter().map(Vec::len).sum();
    assert_eq!(total, 20);
}

#[tokio::test]
async fn queue_survives_store_reopen() {
    let fx = fixture();
    fx.backend.set_offline(true);
    fx.host.set_snapshot(snapshot(20.0, 40.0, 50.0));
    Sampler::new(fx.ctx.clone()).tick().await.unwrap();

    // A fresh handle on the same database sees the queued item
    let db_path = fx.ctx.data_dir.join("agent.db");
    let reopened = pk_storage::Store::open(db_path).unwrap();
    let items = reopened.claim(Some(QueueType::Telemetry), 10).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].status, QueueStatus::Pending);
}
