// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared context threaded through every subsystem.
//!
//! There is no process-global state: the coordinator builds one context
//! and hands clones to the subsystems. The backup engine is long-lived
//! and shared (command handlers and the retention sweep use the same
//! instance).

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use pk_api::Backend;
use pk_core::Config;
use pk_sensors::HostMonitor;
use pk_storage::Store;
use pk_vault::BackupEngine;

pub struct AgentContext<B: Backend, H: HostMonitor> {
    pub config: Arc<Mutex<Config>>,
    pub store: Store,
    pub backend: Arc<B>,
    pub host: Arc<H>,
    pub vault: Arc<BackupEngine>,
    pub device_id: String,
    pub data_dir: PathBuf,
}

impl<B: Backend, H: HostMonitor> Clone for AgentContext<B, H> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            store: self.store.clone(),
            backend: Arc::clone(&self.backend),
            host: Arc::clone(&self.host),
            vault: Arc::clone(&self.vault),
            device_id: self.device_id.clone(),
            data_dir: self.data_dir.clone(),
        }
    }
}
