// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn load_in(dir: &Path) -> Config {
    let path = dir.join("config.toml");
    // Point directories inside the tempdir so tests don't litter the cwd
    let raw = format!(
        r#"
[agent]
data_dir = "{data}"
backup_dir = "{backup}"

[security]
quarantine_dir = "{quarantine}"
"#,
        data = dir.join("data").display(),
        backup = dir.join("backups").display(),
        quarantine = dir.join("quarantine").display(),
    );
    std::fs::write(&path, raw).unwrap();
    Config::load(&path).unwrap()
}

#[test]
fn defaults_applied_for_missing_keys() {
    let dir = tempdir().unwrap();
    let config = load_in(dir.path());

    assert_eq!(config.agent.name, "ProtektAgent");
    assert_eq!(config.monitoring.cpu_threshold, 80.0);
    assert_eq!(config.monitoring.memory_threshold, 85.0);
    assert_eq!(config.monitoring.disk_threshold, 90.0);
    assert_eq!(config.saas.heartbeat_interval, 300);
    assert_eq!(config.saas.command_poll_interval, 60);
    assert_eq!(config.backup.compression_level, 6);
    assert_eq!(config.backup.retention_days, 30);
    assert_eq!(config.alerts.alert_cooldown, 300);
    assert_eq!(config.security.max_file_size, 100 * 1024 * 1024);
}

#[test]
fn generates_and_persists_device_id_and_encryption_key() {
    let dir = tempdir().unwrap();
    let config = load_in(dir.path());

    assert_eq!(config.agent.device_id.len(), 32);
    assert_eq!(config.backup.encryption_key.len(), 64);

    // A second load sees the same generated values
    let reloaded = Config::load(config.path()).unwrap();
    assert_eq!(reloaded.agent.device_id, config.agent.device_id);
    assert_eq!(reloaded.backup.encryption_key, config.backup.encryption_key);
}

#[test]
fn creates_required_directories() {
    let dir = tempdir().unwrap();
    let config = load_in(dir.path());

    assert!(config.agent.data_dir.is_dir());
    assert!(config.logs_dir().is_dir());
    assert!(config.agent.backup_dir.is_dir());
    assert!(config.security.quarantine_dir.is_dir());
}

#[test]
fn set_writes_through_and_persists() {
    let dir = tempdir().unwrap();
    let mut config = load_in(dir.path());

    config.set("monitoring", "cpu_threshold", "70.5").unwrap();
    assert_eq!(config.monitoring.cpu_threshold, 70.5);

    let reloaded = Config::load(config.path()).unwrap();
    assert_eq!(reloaded.monitoring.cpu_threshold, 70.5);
}

#[test]
fn set_rejects_unknown_key() {
    let dir = tempdir().unwrap();
    let mut config = load_in(dir.path());

    let err = config.set("monitoring", "no_such_key", "1").unwrap_err();
    assert!(matches!(err, ConfigError::UnknownKey { .. }));
}

#[test]
fn set_rejects_unparseable_value() {
    let dir = tempdir().unwrap();
    let mut config = load_in(dir.path());

    let err = config
        .set("monitoring", "cpu_threshold", "not-a-number")
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
    // Value untouched on failure
    assert_eq!(config.monitoring.cpu_threshold, 80.0);
}

#[test]
fn set_parses_comma_separated_lists() {
    let dir = tempdir().unwrap();
    let mut config = load_in(dir.path());

    config
        .set("monitoring", "file_watch_paths", "/home, /srv/shared")
        .unwrap();
    assert_eq!(
        config.monitoring.file_watch_paths,
        vec!["/home".to_string(), "/srv/shared".to_string()]
    );
}
