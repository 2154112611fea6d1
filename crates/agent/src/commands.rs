// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command loop: poll the backend, dispatch typed commands, route results
//! back through the queue when delivery fails.
//!
//! `command_id` uniqueness in the store makes duplicate poll responses
//! harmless: the second sighting of an id never reaches a handler.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pk_api::{Backend, RemoteCommand};
use pk_core::{BackupType, CommandStatus, NewSecurityEvent, QueueType, Severity};
use pk_sensors::HostMonitor;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::AgentContext;
use crate::error::AgentError;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command type: {0}")]
    UnknownType(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("{0}")]
    Failed(String),
}

/// A remote command parsed into its typed form
#[derive(Debug)]
pub enum CommandRequest {
    Backup {
        source_paths: Vec<String>,
        backup_type: BackupType,
        description: String,
        upload_url: Option<String>,
    },
    Restore {
        backup_id: String,
        restore_path: Option<PathBuf>,
    },
    Scan {
        scan_type: ScanType,
        target_paths: Vec<String>,
    },
    Isolate {
        file_paths: Vec<String>,
    },
    UpdateConfig {
        sections: serde_json::Map<String, Value>,
    },
    Shutdown {
        delay_secs: u64,
    },
    Restart {
        delay_secs: u64,
    },
    GetStatus,
    GetLogs {
        log_type: String,
        lines: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    Full,
    Targeted,
}

fn default_power_delay() -> u64 {
    10
}

#[derive(Deserialize)]
struct BackupParams {
    source_paths: Vec<String>,
    #[serde(default)]
    backup_type: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    upload_url: Option<String>,
}

#[derive(Deserialize)]
struct RestoreParams {
    backup_id: String,
    #[serde(default)]
    restore_path: Option<PathBuf>,
}

#[derive(Deserialize)]
struct ScanParams {
    #[serde(default)]
    scan_type: Option<String>,
    #[serde(default)]
    target_paths: Vec<String>,
}

#[derive(Deserialize)]
struct IsolateParams {
    file_paths: Vec<String>,
}

#[derive(Deserialize)]
struct UpdateConfigParams {
    config: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct PowerParams {
    #[serde(default = "default_power_delay")]
    delay: u64,
}

#[derive(Deserialize)]
struct GetLogsParams {
    #[serde(default)]
    log_type: Option<String>,
    #[serde(default)]
    lines: Option<usize>,
}

impl CommandRequest {
    /// Parse the wire `type` and `parameters` into a typed request.
    pub fn parse(command_type: &str, parameters: &Value) -> Result<Self, CommandError> {
        // Null parameters mean "no parameters" on the wire
        let empty = Value::Object(serde_json::Map::new());
        let params = if parameters.is_null() {
            &empty
        } else {
            parameters
        };
        let invalid = |e: serde_json::Error| CommandError::InvalidParameters(e.to_string());

        match command_type {
            "backup" => {
                let p: BackupParams = serde_json::from_value(params.clone()).map_err(invalid)?;
                if p.source_paths.is_empty() {
                    return Err(CommandError::InvalidParameters(
                        "no source paths specified for backup".to_string(),
                    ));
                }
                let backup_type = match p.backup_type.as_deref() {
                    None => BackupType::Command,
                    Some(raw) => BackupType::parse(raw).ok_or_else(|| {
                        CommandError::InvalidParameters(format!("unknown backup_type: {raw}"))
                    })?,
                };
                Ok(CommandRequest::Backup {
                    source_paths: p.source_paths,
                    backup_type,
                    description: p
                        .description
                        .unwrap_or_else(|| "Command-triggered backup".to_string()),
                    upload_url: p.upload_url,
                })
            }
            "restore" => {
                let p: RestoreParams = serde_json::from_value(params.clone()).map_err(invalid)?;
                Ok(CommandRequest::Restore {
                    backup_id: p.backup_id,
                    restore_path: p.restore_path,
                })
            }
            "scan" => {
                let p: ScanParams = serde_json::from_value(params.clone()).map_err(invalid)?;
                let scan_type = match p.scan_type.as_deref().unwrap_or("full") {
                    "full" => ScanType::Full,
                    "targeted" => ScanType::Targeted,
                    other => {
                        return Err(CommandError::InvalidParameters(format!(
                            "unknown scan type: {other}"
                        )))
                    }
                };
                Ok(CommandRequest::Scan {
                    scan_type,
                    target_paths: p.target_paths,
                })
            }
            "isolate" => {
                let p: IsolateParams = serde_json::from_value(params.clone()).map_err(invalid)?;
                Ok(CommandRequest::Isolate {
                    file_paths: p.file_paths,
                })
            }
            "update_config" => {
                let p: UpdateConfigParams =
                    serde_json::from_value(params.clone()).map_err(invalid)?;
                Ok(CommandRequest::UpdateConfig { sections: p.config })
            }
            "shutdown" => {
                let p: PowerParams = serde_json::from_value(params.clone()).map_err(invalid)?;
                Ok(CommandRequest::Shutdown { delay_secs: p.delay })
            }
            "restart" => {
                let p: PowerParams = serde_json::from_value(params.clone()).map_err(invalid)?;
                Ok(CommandRequest::Restart { delay_secs: p.delay })
            }
            "get_status" => Ok(CommandRequest::GetStatus),
            "get_logs" => {
                let p: GetLogsParams = serde_json::from_value(params.clone()).map_err(invalid)?;
                let log_type = p.log_type.unwrap_or_else(|| "agent".to_string());
                if !["agent", "security", "audit"].contains(&log_type.as_str()) {
                    return Err(CommandError::InvalidParameters(format!(
                        "unknown log type: {log_type}"
                    )));
                }
                Ok(CommandRequest::GetLogs {
                    log_type,
                    lines: p.lines.unwrap_or(100),
                })
            }
            other => Err(CommandError::UnknownType(other.to_string())),
        }
    }
}

pub struct CommandLoop<B: Backend, H: HostMonitor> {
    ctx: AgentContext<B, H>,
    poll_interval: Duration,
}

impl<B: Backend, H: HostMonitor> CommandLoop<B, H> {
    pub fn new(ctx: AgentContext<B, H>) -> Self {
        let poll_interval = Duration::from_secs(ctx.config.lock().saas.command_poll_interval);
        Self { ctx, poll_interval }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_secs = self.poll_interval.as_secs(),
            "command loop started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!(error = %e, "command poll failed");
                    }
                }
            }
        }
        info!("command loop stopped");
    }

    /// One poll pass: fetch commands and process each. Returns how many
    /// handlers actually ran (duplicates excluded).
    pub async fn poll_once(&self) -> Result<usize, AgentError> {
        let commands = match self.ctx.backend.fetch_commands(&self.ctx.device_id).await {
            Ok(commands) => commands,
            Err(e) => {
                debug!(error = %e, "command poll unavailable");
                return Ok(0);
            }
        };

        let mut executed = 0usize;
        for command in commands {
            match self.process(command).await {
                Ok(true) => executed += 1,
                Ok(false) => {}
                Err(e) => error!(error = %e, "command processing failed"),
            }
        }
        Ok(executed)
    }

    /// Record, execute and report one command. Returns whether a handler
    /// ran (false for duplicates).
    async fn process(&self, command: RemoteCommand) -> Result<bool, AgentError> {
        let newly_inserted = self.ctx.store.insert_command(
            &command.id,
            &command.command_type,
            &command.parameters,
        )?;
        if !newly_inserted {
            debug!(command_id = command.id, "duplicate command, skipping");
            return Ok(false);
        }

        info!(
            command_id = command.id,
            command_type = command.command_type,
            "processing command"
        );
        self.ctx
            .store
            .set_command_status(&command.id, CommandStatus::Executing, None)?;

        let outcome = match CommandRequest::parse(&command.command_type, &command.parameters) {
            Ok(request) => self.execute(request).await,
            Err(e) => Err(e),
        };

        let (status, result) = match outcome {
            Ok(result) => (CommandStatus::Completed, result),
            Err(e) => {
                warn!(command_id = command.id, error = %e, "command failed");
                (
                    CommandStatus::Failed,
                    json!({"success": false, "error": e.to_string()}),
                )
            }
        };
        self.ctx
            .store
            .set_command_status(&command.id, status, Some(&result))?;

        self.deliver_result(&command.id, &result).await?;
        Ok(true)
    }

    async fn deliver_result(&self, command_id: &str, result: &Value) -> Result<(), AgentError> {
        match self
            .ctx
            .backend
            .post_command_result(&self.ctx.device_id, command_id, result)
            .await
        {
            Ok(()) => debug!(command_id, "command result sent"),
            Err(e) => {
                warn!(command_id, error = %e, "result delivery failed, queueing");
                self.ctx.store.enqueue(
                    QueueType::CommandResult,
                    &json!({"command_id": command_id, "result": result}),
                    QueueType::CommandResult.priority(),
                )?;
            }
        }
        Ok(())
    }

    async fn execute(&self, request: CommandRequest) -> Result<Value, CommandError> {
        match request {
            CommandRequest::Backup {
                source_paths,
                backup_type,
                description,
                upload_url,
            } => {
                self.handle_backup(source_paths, backup_type, description, upload_url)
                    .await
            }
            CommandRequest::Restore {
                backup_id,
                restore_path,
            } => self.handle_restore(backup_id, restore_path).await,
            CommandRequest::Scan {
                scan_type,
                target_paths,
            } => self.handle_scan(scan_type, &target_paths),
            CommandRequest::Isolate { file_paths } => self.handle_isolate(&file_paths),
            CommandRequest::UpdateConfig { sections } => self.handle_update_config(&sections),
            CommandRequest::Shutdown { delay_secs } => {
                schedule_power_action(PowerAction::Shutdown, Duration::from_secs(delay_secs));
                Ok(json!({
                    "success": true,
                    "message": format!("System will shutdown in {delay_secs} seconds"),
                }))
            }
            CommandRequest::Restart { delay_secs } => {
                schedule_power_action(PowerAction::Restart, Duration::from_secs(delay_secs));
                Ok(json!({
                    "success": true,
                    "message": format!("System will restart in {delay_secs} seconds"),
                }))
            }
            CommandRequest::GetStatus => self.handle_get_status().await,
            CommandRequest::GetLogs { log_type, lines } => self.handle_get_logs(&log_type, lines),
        }
    }

    async fn handle_backup(
        &self,
        source_paths: Vec<String>,
        backup_type: BackupType,
        description: String,
        upload_url: Option<String>,
    ) -> Result<Value, CommandError> {
        let vault = Arc::clone(&self.ctx.vault);
        let record = tokio::task::spawn_blocking(move || {
            vault.create(&source_paths, backup_type, &description)
        })
        .await
        .map_err(|e| CommandError::Failed(e.to_string()))?
        .map_err(|e| CommandError::Failed(e.to_string()))?;

        if let Some(upload_url) = upload_url {
            self.ctx
                .store
                .enqueue(
                    QueueType::BackupUpload,
                    &json!({"backup_id": record.backup_id, "upload_url": upload_url}),
                    QueueType::BackupUpload.priority(),
                )
                .map_err(|e| CommandError::Failed(e.to_string()))?;
        }

        Ok(json!({
            "success": true,
            "backup_id": record.backup_id,
            "message": format!("Backup created successfully: {}", record.backup_id),
        }))
    }

    async fn handle_restore(
        &self,
        backup_id: String,
        restore_path: Option<PathBuf>,
    ) -> Result<Value, CommandError> {
        let vault = Arc::clone(&self.ctx.vault);
        let id = backup_id.clone();
        tokio::task::spawn_blocking(move || vault.restore(&id, restore_path.as_deref()))
            .await
            .map_err(|e| CommandError::Failed(e.to_string()))?
            .map_err(|e| CommandError::Failed(e.to_string()))?;

        Ok(json!({
            "success": true,
            "message": format!("Backup restored successfully: {backup_id}"),
        }))
    }

    fn handle_scan(
        &self,
        scan_type: ScanType,
        target_paths: &[String],
    ) -> Result<Value, CommandError> {
        let results = match scan_type {
            ScanType::Full => {
                let since = chrono::Utc::now() - chrono::Duration::hours(1);
                let events = self
                    .ctx
                    .store
                    .events_since(since)
                    .map_err(|e| CommandError::Failed(e.to_string()))?;
                let suspicious: Vec<Value> = events
                    .iter()
                    .filter(|e| e.file_path.is_some())
                    .map(|e| {
                        json!({
                            "event_type": e.event_type,
                            "severity": e.severity,
                            "file_path": e.file_path,
                        })
                    })
                    .collect();
                json!({
                    "files_scanned": 0,
                    "threats_found": events.len(),
                    "suspicious_files": suspicious,
                })
            }
            ScanType::Targeted => {
                let mut files_scanned = 0usize;
                for path in target_paths {
                    let path = Path::new(path);
                    if path.is_file() {
                        files_scanned += 1;
                    } else if path.is_dir() {
                        files_scanned += walkdir::WalkDir::new(path)
                            .into_iter()
                            .filter_map(Result::ok)
                            .filter(|e| e.file_type().is_file())
                            .count();
                    }
                }
                json!({
                    "paths_scanned": target_paths,
                    "files_scanned": files_scanned,
                    "threats_found": 0,
                })
            }
        };

        let label = match scan_type {
            ScanType::Full => "full",
            ScanType::Targeted => "targeted",
        };
        Ok(json!({
            "success": true,
            "scan_type": label,
            "results": results,
            "message": format!("Scan completed: {label}"),
        }))
    }

    fn handle_isolate(&self, file_paths: &[String]) -> Result<Value, CommandError> {
        let quarantine_dir = self.ctx.config.lock().security.quarantine_dir.clone();
        std::fs::create_dir_all(&quarantine_dir)
            .map_err(|e| CommandError::Failed(e.to_string()))?;

        let mut isolated = Vec::new();
        for file_path in file_paths {
            let source = Path::new(file_path);
            if !source.exists() {
                warn!(path = file_path, "isolate target does not exist");
                continue;
            }
            let Some(name) = source.file_name() else {
                warn!(path = file_path, "isolate target has no file name");
                continue;
            };
            let quarantine_path = quarantine_dir.join(name);
            if let Err(e) = std::fs::rename(source, &quarantine_path) {
                warn!(path = file_path, error = %e, "failed to isolate file");
                continue;
            }

            self.ctx
                .store
                .insert_security_event(
                    &NewSecurityEvent::new(
                        "file_isolated",
                        Severity::High,
                        format!("File isolated: {file_path}"),
                    )
                    .with_file_path(file_path.clone())
                    .with_details(json!({
                        "quarantine_path": quarantine_path.display().to_string(),
                    })),
                )
                .map_err(|e| CommandError::Failed(e.to_string()))?;
            isolated.push(quarantine_path.display().to_string());
        }

        Ok(json!({
            "success": true,
            "isolated_files": isolated,
            "message": format!("Isolated {} files", isolated.len()),
        }))
    }

    fn handle_update_config(
        &self,
        sections: &serde_json::Map<String, Value>,
    ) -> Result<Value, CommandError> {
        let mut updated = Vec::new();
        let mut config = self.ctx.config.lock();

        for (section, settings) in sections {
            let Some(settings) = settings.as_object() else {
                return Err(CommandError::InvalidParameters(format!(
                    "section {section} is not an object"
                )));
            };
            for (key, value) in settings {
                let raw = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    other => {
                        return Err(CommandError::InvalidParameters(format!(
                            "unsupported value for {section}.{key}: {other}"
                        )))
                    }
                };
                config
                    .set(section, key, &raw)
                    .map_err(|e| CommandError::InvalidParameters(e.to_string()))?;
                updated.push(format!("{section}.{key}"));
            }
        }

        Ok(json!({
            "success": true,
            "updated_settings": updated,
            "message": format!("Updated {} configuration settings", updated.len()),
        }))
    }

    async fn handle_get_status(&self) -> Result<Value, CommandError> {
        let snapshot = self
            .ctx
            .host
            .snapshot()
            .await
            .map_err(|e| CommandError::Failed(e.to_string()))?;

        let disk_usage: serde_json::Map<String, Value> = snapshot
            .disks
            .iter()
            .map(|d| {
                (
                    d.mount_point.clone(),
                    json!({
                        "total": d.total_bytes,
                        "free": d.available_bytes,
                        "percent": d.percent,
                    }),
                )
            })
            .collect();

        Ok(json!({
            "success": true,
            "status": {
                "cpu_percent": snapshot.cpu_percent,
                "memory_percent": snapshot.memory_percent,
                "disk_usage": disk_usage,
                "uptime": snapshot.uptime_seconds,
                "processes": snapshot.processes_count,
                "agent_status": "running",
            },
            "message": "Status retrieved successfully",
        }))
    }

    fn handle_get_logs(&self, log_type: &str, lines: usize) -> Result<Value, CommandError> {
        let log_file = self.ctx.data_dir.join("logs").join(format!("{log_type}.log"));
        if !log_file.exists() {
            return Err(CommandError::Failed(format!(
                "log file not found: {}",
                log_file.display()
            )));
        }

        let raw = std::fs::read_to_string(&log_file)
            .map_err(|e| CommandError::Failed(e.to_string()))?;
        let all: Vec<&str> = raw.lines().collect();
        let tail: Vec<String> = all
            .iter()
            .skip(all.len().saturating_sub(lines))
            .map(|s| s.to_string())
            .collect();

        Ok(json!({
            "success": true,
            "logs": tail,
            "message": format!("Retrieved {} log lines", tail.len()),
        }))
    }
}

#[derive(Debug, Clone, Copy)]
enum PowerAction {
    Shutdown,
    Restart,
}

/// Kick off the platform shutdown/restart after `delay`. The command
/// result is reported before the machine goes down.
fn schedule_power_action(action: PowerAction, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        #[cfg(unix)]
        let status = tokio::process::Command::new("shutdown")
            .arg(match action {
                PowerAction::Shutdown => "-h",
                PowerAction::Restart => "-r",
            })
            .arg("now")
            .status()
            .await;

        #[cfg(windows)]
        let status = tokio::process::Command::new("shutdown")
            .arg(match action {
                PowerAction::Shutdown => "/s",
                PowerAction::Restart => "/r",
            })
            .args(["/t", "0"])
            .status()
            .await;

        #[cfg(not(any(unix, windows)))]
        let status: Result<std::process::ExitStatus, std::io::Error> =
            Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "power actions unsupported on this platform",
            ));

        match status {
            Ok(code) => info!(?action, %code, "power action issued"),
            Err(e) => error!(?action, error = %e, "power action failed"),
        }
    });
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
