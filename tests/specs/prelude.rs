// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture for the spec tests

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use pk_agent::AgentContext;
use pk_api::FakeBackend;
use pk_core::Config;
use pk_sensors::{DiskUsage, FakeHost, HostSnapshot};
use pk_storage::Store;
use pk_vault::{BackupEngine, EngineConfig};

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub ctx: AgentContext<FakeBackend, FakeHost>,
    pub backend: Arc<FakeBackend>,
    pub host: Arc<FakeHost>,
    pub store: Store,
    pub vault: Arc<BackupEngine>,
}

pub fn fixture() -> Fixture {
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

    Fixture {
        ctx: AgentContext {
            config: Arc::new(Mutex::new(config)),
            store: store.clone(),
            backend: Arc::clone(&backend),
            host: Arc::clone(&host),
            vault: Arc::clone(&vault),
            device_id,
            data_dir,
        },
        backend,
        host,
        store,
        vault,
        dir,
    }
}

pub fn snapshot(cpu: f64, memory: f64, disk: f64) -> HostSnapshot {
    HostSnapshot {
        cpu_percent: cpu,
        memory_percent: memory,
        disks: vec![DiskUsage {
            mount_point: "/".to_string(),
            total_bytes: 1_000_000,
            available_bytes: 300_000,
            percent: disk,
        }],
        processes_count: 150,
        uptime_seconds: 7200,
        ip_address: Some("192.168.1.20".to_string()),
        hostname: Some("front-desk".to_string()),
        platform: "linux".to_string(),
        ..HostSnapshot::default()
    }
}

pub fn write_tree(root: &PathBuf, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
}
