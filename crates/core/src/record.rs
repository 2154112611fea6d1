// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent record types shared between the store and the subsystems

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a security event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of fact waiting in the offline queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueType {
    Telemetry,
    SecurityEvent,
    CommandResult,
    BackupUpload,
}

impl QueueType {
    pub const ALL: [QueueType; 4] = [
        QueueType::Telemetry,
        QueueType::SecurityEvent,
        QueueType::CommandResult,
        QueueType::BackupUpload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueType::Telemetry => "telemetry",
            QueueType::SecurityEvent => "security_event",
            QueueType::CommandResult => "command_result",
            QueueType::BackupUpload => "backup_upload",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "telemetry" => Some(QueueType::Telemetry),
            "security_event" => Some(QueueType::SecurityEvent),
            "command_result" => Some(QueueType::CommandResult),
            "backup_upload" => Some(QueueType::BackupUpload),
            _ => None,
        }
    }

    /// Drain priority assigned at enqueue time (higher drains first).
    pub fn priority(&self) -> i64 {
        match self {
            QueueType::Telemetry => 1,
            QueueType::SecurityEvent => 2,
            QueueType::CommandResult => 3,
            QueueType::BackupUpload => 4,
        }
    }
}

impl std::fmt::Display for QueueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a queue item through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(QueueStatus::Pending),
            "processing" => Some(QueueStatus::Processing),
            "completed" => Some(QueueStatus::Completed),
            "failed" => Some(QueueStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the durable offline queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: i64,
    pub queue_type: QueueType,
    pub payload: Value,
    pub priority: i64,
    pub created_at: DateTime<Utc>,
    pub retry_count: i64,
    pub max_retries: i64,
    pub status: QueueStatus,
}

/// Cached host observation written by the telemetry sampler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    /// Max usage across partitions
    pub disk_percent: f64,
    pub processes_count: i64,
    pub uptime_seconds: i64,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub network_io: Value,
}

/// A security event awaiting alerting and sync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: i64,
    pub event_type: String,
    pub severity: Severity,
    pub description: String,
    pub file_path: Option<String>,
    pub process_name: Option<String>,
    pub details: Option<Value>,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
}

/// Security event fields as produced by a detector, before insertion
#[derive(Debug, Clone)]
pub struct NewSecurityEvent {
    pub event_type: String,
    pub severity: Severity,
    pub description: String,
    pub file_path: Option<String>,
    pub process_name: Option<String>,
    pub details: Option<Value>,
}

impl NewSecurityEvent {
    pub fn new(
        event_type: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            severity,
            description: description.into(),
            file_path: None,
            process_name: None,
            details: None,
        }
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_process_name(mut self, name: impl Into<String>) -> Self {
        self.process_name = Some(name.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// How a backup came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    Manual,
    Scheduled,
    Command,
}

impl BackupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupType::Manual => "manual",
            BackupType::Scheduled => "scheduled",
            BackupType::Command => "command",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(BackupType::Manual),
            "scheduled" => Some(BackupType::Scheduled),
            "command" => Some(BackupType::Command),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackupType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one encrypted backup artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub backup_id: String,
    pub backup_type: BackupType,
    pub source_paths: Vec<String>,
    pub backup_path: String,
    pub size_bytes: i64,
    pub encrypted: bool,
    /// SHA-256 of the encrypted artifact, lowercase hex
    pub checksum: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub uploaded: bool,
    pub upload_url: Option<String>,
}

/// Status of a remotely issued command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Received,
    Executing,
    Completed,
    Failed,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Received => "received",
            CommandStatus::Executing => "executing",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "received" => Some(CommandStatus::Received),
            "executing" => Some(CommandStatus::Executing),
            "completed" => Some(CommandStatus::Completed),
            "failed" => Some(CommandStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one command received from the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command_id: String,
    pub command_type: String,
    pub parameters: Value,
    pub status: CommandStatus,
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Append-only audit row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub action: String,
    pub resource: Option<String>,
    pub details: Option<Value>,
    pub timestamp: DateTime<Utc>,
    pub category: Option<String>,
}

/// Registration state of this device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Active,
    Offline,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Active => "active",
            RegistrationStatus::Offline => "offline",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(RegistrationStatus::Active),
            "offline" => Some(RegistrationStatus::Offline),
            _ => None,
        }
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single registration row for this device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub device_id: String,
    pub org_id: Option<String>,
    pub api_key: Option<String>,
    pub registered_at: Option<DateTime<Utc>>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub status: RegistrationStatus,
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
