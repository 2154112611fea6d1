// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the daemon's unit tests

use std::sync::Arc;

use parking_lot::Mutex;
use pk_api::FakeBackend;
use pk_core::Config;
use pk_sensors::{DiskUsage, FakeHost, HostSnapshot};
use pk_storage::Store;
use pk_vault::{BackupEngine, EngineConfig};

use crate::context::AgentContext;

pub(crate) struct TestCtx {
    pub dir: tempfile::TempDir,
    pub ctx: AgentContext<FakeBackend, FakeHost>,
    pub backend: Arc<FakeBackend>,
    pub host: Arc<FakeHost>,
    pub store: Store,
}

#[allow(clippy::unwrap_used)]
pub(crate) fn test_context() -> TestCtx {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let raw = format!(
        r#"
[agent]
data_dir = "{data}"
backup_dir = "{backup}"

[security]
quarantine_dir = "{quarantine}"
"#,
        data = root.join("data").display(),
        backup = root.join("backups").display(),
        quarantine = root.join("quarantine").display(),
    );
    std::fs::write(root.join("config.toml"), raw).unwrap();
    let config = Config::load(root.join("config.toml")).unwrap();

    let store = Store::open(config.data_dir().join("agent.db"))
        .unwrap()
        .with_log_dir(config.logs_dir());
    let vault = Arc::new(
        BackupEngine::new(
            store.clone(),
            EngineConfig {
                backup_dir: config.agent.backup_dir.clone(),
                encryption_key_hex: config.backup.encryption_key.clone(),
                compression_level: config.backup.compression_level,
                max_backup_size: config.backup.max_backup_size,
                retention_days: config.backup.retention_days,
            },
        )
        .unwrap(),
    );

    let backend = Arc::new(FakeBackend::new());
    let host = Arc::new(FakeHost::new(HostSnapshot::default()));
    let device_id = config.agent.device_id.clone();
    let data_dir = config.agent.data_dir.clone();

    TestCtx {
        ctx: AgentContext {
            config: Arc::new(Mutex::new(config)),
            store: store.clone(),
            backend: Arc::clone(&backend),
            host: Arc::clone(&host),
            vault,
            device_id,
            data_dir,
        },
        backend,
        host,
        store,
        dir,
    }
}

pub(crate) fn snapshot(cpu: f64, memory: f64, disk: f64) -> HostSnapshot {
    HostSnapshot {
        cpu_percent: cpu,
        memory_percent: memory,
        disks: vec![DiskUsage {
            mount_point: "/".to_string(),
            total_bytes: 1_000_000,
            available_bytes: 400_000,
            percent: disk,
        }],
        processes_count: 120,
        uptime_seconds: 3600,
        ip_address: Some("10.1.2.3".to_string()),
        hostname: Some("test-host".to_string()),
        platform: "linux".to_string(),
        ..HostSnapshot::default()
    }
}
