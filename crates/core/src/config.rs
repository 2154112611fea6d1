// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sectioned agent configuration backed by a TOML file.
//!
//! The file is created with defaults on first start. Two values are
//! generated and persisted the first time they are needed: the stable
//! 32-hex `device_id` and the 64-hex backup `encryption_key`. Remote
//! `update_config` commands write through [`Config::set`], which dispatches
//! on known section/key pairs and rejects everything else.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::token_hex;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown config key {section}.{key}")]
    UnknownKey { section: String, key: String },

    #[error("invalid value for {section}.{key}: {value:?}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("./backups")
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_agent_name() -> String {
    "ProtektAgent".to_string()
}

/// `[agent]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_agent_name")]
    pub name: String,
    /// Stable 32-hex device id, generated on first load
    #[serde(default)]
    pub device_id: String,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backup_dir: default_backup_dir(),
            log_level: default_log_level(),
            name: default_agent_name(),
            device_id: String::new(),
        }
    }
}

fn default_quarantine_dir() -> PathBuf {
    PathBuf::from("./quarantine")
}

fn default_suspicious_extensions() -> Vec<String> {
    [".exe", ".bat", ".cmd", ".scr", ".pif", ".com", ".vbs", ".js"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_file_size() -> u64 {
    100 * 1024 * 1024
}

/// `[security]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySection {
    #[serde(default = "default_quarantine_dir")]
    pub quarantine_dir: PathBuf,
    #[serde(default = "default_suspicious_extensions")]
    pub suspicious_extensions: Vec<String>,
    /// Files larger than this are ignored by the watcher (bytes)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            quarantine_dir: default_quarantine_dir(),
            suspicious_extensions: default_suspicious_extensions(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_cpu_threshold() -> f64 {
    80.0
}

fn default_memory_threshold() -> f64 {
    85.0
}

fn default_disk_threshold() -> f64 {
    90.0
}

/// `[monitoring]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSection {
    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold: f64,
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold: f64,
    #[serde(default = "default_disk_threshold")]
    pub disk_threshold: f64,
    #[serde(default)]
    pub file_watch_paths: Vec<String>,
    /// Paths excluded from watching; a trailing `*` matches one level
    #[serde(default)]
    pub exclude_paths: Vec<String>,
}

impl Default for MonitoringSection {
    fn default() -> Self {
        Self {
            cpu_threshold: default_cpu_threshold(),
            memory_threshold: default_memory_threshold(),
            disk_threshold: default_disk_threshold(),
            file_watch_paths: Vec::new(),
            exclude_paths: Vec::new(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    300
}

fn default_command_poll_interval() -> u64 {
    60
}

fn default_sync_interval() -> u64 {
    300
}

fn default_max_retries() -> i64 {
    3
}

fn default_timeout() -> u64 {
    30
}

/// `[saas]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaasSection {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub org_id: String,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    #[serde(default = "default_command_poll_interval")]
    pub command_poll_interval: u64,
    #[serde(default = "default_sync_interval")]
    pub sync_interval: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,
    /// Outbound HTTP timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for SaasSection {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            org_id: String::new(),
            heartbeat_interval: default_heartbeat_interval(),
            command_poll_interval: default_command_poll_interval(),
            sync_interval: default_sync_interval(),
            max_retries: default_max_retries(),
            timeout: default_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_compression_level() -> u32 {
    6
}

fn default_max_backup_size() -> u64 {
    1024 * 1024 * 1024
}

fn default_retention_days() -> i64 {
    30
}

/// `[backup]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
    #[serde(default = "default_max_backup_size")]
    pub max_backup_size: u64,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// 64-hex key material, generated on first load
    #[serde(default)]
    pub encryption_key: String,
}

impl Default for BackupSection {
    fn default() -> Self {
        Self {
            enabled: true,
            compression_level: default_compression_level(),
            max_backup_size: default_max_backup_size(),
            retention_days: default_retention_days(),
            encryption_key: String::new(),
        }
    }
}

fn default_alert_cooldown() -> u64 {
    300
}

fn default_smtp_port() -> u16 {
    587
}

/// `[alerts]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum seconds between two alerts sharing a dedup key
    #[serde(default = "default_alert_cooldown")]
    pub alert_cooldown: u64,
    #[serde(default)]
    pub whatsapp_webhook: String,
    #[serde(default)]
    pub email_smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub email_smtp_port: u16,
    #[serde(default)]
    pub email_username: String,
    #[serde(default)]
    pub email_password: String,
    #[serde(default)]
    pub email_recipient: String,
}

impl Default for AlertsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            alert_cooldown: default_alert_cooldown(),
            whatsapp_webhook: String::new(),
            email_smtp_server: String::new(),
            email_smtp_port: default_smtp_port(),
            email_username: String::new(),
            email_password: String::new(),
            email_recipient: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    agent: AgentSection,
    #[serde(default)]
    security: SecuritySection,
    #[serde(default)]
    monitoring: MonitoringSection,
    #[serde(default)]
    saas: SaasSection,
    #[serde(default)]
    backup: BackupSection,
    #[serde(default)]
    alerts: AlertsSection,
}

/// Process-wide agent configuration
#[derive(Debug, Clone)]
pub struct Config {
    path: PathBuf,
    pub agent: AgentSection,
    pub security: SecuritySection,
    pub monitoring: MonitoringSection,
    pub saas: SaasSection,
    pub backup: BackupSection,
    pub alerts: AlertsSection,
}

impl Config {
    /// Load configuration from `path`, creating it with defaults when missing.
    ///
    /// Generates and persists `device_id` and `backup.encryption_key` when
    /// absent, and creates the data, backup and quarantine directories.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let file = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            toml::from_str::<ConfigFile>(&raw).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            ConfigFile::default()
        };

        let mut config = Self {
            path,
            agent: file.agent,
            security: file.security,
            monitoring: file.monitoring,
            saas: file.saas,
            backup: file.backup,
            alerts: file.alerts,
        };

        let mut dirty = !config.path.exists();
        if config.agent.device_id.is_empty() {
            config.agent.device_id = token_hex(16);
            dirty = true;
        }
        if config.backup.encryption_key.is_empty() {
            config.backup.encryption_key = token_hex(32);
            dirty = true;
        }
        if dirty {
            config.save()?;
        }

        config.ensure_directories()?;
        Ok(config)
    }

    /// Persist the current configuration back to its file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let file = ConfigFile {
            agent: self.agent.clone(),
            security: self.security.clone(),
            monitoring: self.monitoring.clone(),
            saas: self.saas.clone(),
            backup: self.backup.clone(),
            alerts: self.alerts.clone(),
        };
        let raw = toml::to_string_pretty(&file)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        std::fs::write(&self.path, raw).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn device_id(&self) -> &str {
        &self.agent.device_id
    }

    pub fn data_dir(&self) -> &Path {
        &self.agent.data_dir
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.agent.data_dir.join("logs")
    }

    fn ensure_directories(&self) -> Result<(), ConfigError> {
        for dir in [
            self.agent.data_dir.clone(),
            self.logs_dir(),
            self.agent.backup_dir.clone(),
            self.security.quarantine_dir.clone(),
        ] {
            std::fs::create_dir_all(&dir)
                .map_err(|source| ConfigError::CreateDir { path: dir, source })?;
        }
        Ok(())
    }

    /// Apply a single `section.key = value` update and persist.
    ///
    /// Unknown keys and unparseable values produce a structured error; the
    /// config is left untouched in that case.
    pub fn set(&mut self, section: &str, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        };

        match (section, key) {
            ("agent", "data_dir") => self.agent.data_dir = PathBuf::from(value),
            ("agent", "backup_dir") => self.agent.backup_dir = PathBuf::from(value),
            ("agent", "log_level") => self.agent.log_level = value.to_string(),
            ("agent", "name") => self.agent.name = value.to_string(),
            ("security", "quarantine_dir") => self.security.quarantine_dir = PathBuf::from(value),
            ("security", "suspicious_extensions") => {
                self.security.suspicious_extensions =
                    value.split(',').map(|s| s.trim().to_string()).collect();
            }
            ("security", "max_file_size") => {
                self.security.max_file_size = value.parse().map_err(|_| invalid())?;
            }
            ("monitoring", "cpu_threshold") => {
                self.monitoring.cpu_threshold = value.parse().map_err(|_| invalid())?;
            }
            ("monitoring", "memory_threshold") => {
                self.monitoring.memory_threshold = value.parse().map_err(|_| invalid())?;
            }
            ("monitoring", "disk_threshold") => {
                self.monitoring.disk_threshold = value.parse().map_err(|_| invalid())?;
            }
            ("monitoring", "file_watch_paths") => {
                self.monitoring.file_watch_paths =
                    value.split(',').map(|s| s.trim().to_string()).collect();
            }
            ("monitoring", "exclude_paths") => {
                self.monitoring.exclude_paths =
                    value.split(',').map(|s| s.trim().to_string()).collect();
            }
            ("saas", "base_url") => self.saas.base_url = value.to_string(),
            ("saas", "api_key") => self.saas.api_key = value.to_string(),
            ("saas", "org_id") => self.saas.org_id = value.to_string(),
            ("saas", "heartbeat_interval") => {
                self.saas.heartbeat_interval = value.parse().map_err(|_| invalid())?;
            }
            ("saas", "command_poll_interval") => {
                self.saas.command_poll_interval = value.parse().map_err(|_| invalid())?;
            }
            ("saas", "sync_interval") => {
                self.saas.sync_interval = value.parse().map_err(|_| invalid())?;
            }
            ("saas", "max_retries") => {
                self.saas.max_retries = value.parse().map_err(|_| invalid())?;
            }
            ("saas", "timeout") => {
                self.saas.timeout = value.parse().map_err(|_| invalid())?;
            }
            ("backup", "enabled") => {
                self.backup.enabled = value.parse().map_err(|_| invalid())?;
            }
            ("backup", "compression_level") => {
                self.backup.compression_level = value.parse().map_err(|_| invalid())?;
            }
            ("backup", "max_backup_size") => {
                self.backup.max_backup_size = value.parse().map_err(|_| invalid())?;
            }
            ("backup", "retention_days") => {
                self.backup.retention_days = value.parse().map_err(|_| invalid())?;
            }
            ("alerts", "enabled") => {
                self.alerts.enabled = value.parse().map_err(|_| invalid())?;
            }
            ("alerts", "alert_cooldown") => {
                self.alerts.alert_cooldown = value.parse().map_err(|_| invalid())?;
            }
            ("alerts", "whatsapp_webhook") => self.alerts.whatsapp_webhook = value.to_string(),
            ("alerts", "email_smtp_server") => self.alerts.email_smtp_server = value.to_string(),
            ("alerts", "email_smtp_port") => {
                self.alerts.email_smtp_port = value.parse().map_err(|_| invalid())?;
            }
            ("alerts", "email_username") => self.alerts.email_username = value.to_string(),
            ("alerts", "email_password") => self.alerts.email_password = value.to_string(),
            ("alerts", "email_recipient") => self.alerts.email_recipient = value.to_string(),
            _ => {
                return Err(ConfigError::UnknownKey {
                    section: section.to_string(),
                    key: key.to_string(),
                })
            }
        }

        self.save()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
