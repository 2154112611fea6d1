// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert dispatcher: scans recent unresolved events and recent commands,
//! renders templated messages, and fans out to the configured transports.
//!
//! Best-effort delivery: a transport failure is logged and the event is
//! still marked resolved so the queue of candidates never wedges.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use pk_alerts::{render, AlertTransport, CooldownTracker};
use pk_core::{Clock, CommandRecord, Config, SecurityEvent, Severity};
use pk_storage::Store;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::AgentError;

const DISPATCH_INTERVAL: Duration = Duration::from_secs(60);
/// How far back the dispatcher looks for candidates
const LOOKBACK: chrono::Duration = chrono::Duration::hours(1);
/// Command types worth telling a human about
const ALERTED_COMMAND_TYPES: [&str; 4] = ["backup", "restore", "scan", "isolate"];

pub struct AlertDispatcher<C: Clock> {
    store: Store,
    config: Arc<Mutex<Config>>,
    transports: Vec<Arc<dyn AlertTransport>>,
    cooldown: CooldownTracker<C>,
    /// Command ids already alerted (scratch state)
    alerted_commands: HashSet<String>,
    device_id: String,
}

impl<C: Clock> AlertDispatcher<C> {
    pub fn new(
        store: Store,
        config: Arc<Mutex<Config>>,
        transports: Vec<Arc<dyn AlertTransport>>,
        clock: C,
    ) -> Self {
        let cooldown_secs = config.lock().alerts.alert_cooldown;
        let device_id = config.lock().agent.device_id.clone();
        Self {
            store,
            config,
            transports,
            cooldown: CooldownTracker::new(Duration::from_secs(cooldown_secs), clock),
            alerted_commands: HashSet::new(),
            device_id,
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(DISPATCH_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(transports = self.transports.len(), "alert dispatcher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "alert dispatch failed");
                    }
                }
            }
        }
        info!("alert dispatcher stopped");
    }

    /// One dispatch pass. Returns the number of alerts emitted.
    pub async fn tick(&mut self) -> Result<usize, AgentError> {
        if !self.config.lock().alerts.enabled {
            return Ok(0);
        }

        let since = Utc::now() - LOOKBACK;
        let mut emitted = 0usize;

        for event in self.store.unresolved_events_since(since)? {
            let key = format!("{}_{}", event.event_type, event.severity);
            if !self.cooldown.should_send(&key) {
                debug!(key, "alert suppressed by cooldown");
                continue;
            }

            let message = render(&event.event_type, &self.event_vars(&event)?);
            self.deliver(&event.event_type, event.severity, &message).await;
            self.record_alert(&event.event_type, event.severity, &message)?;
            self.store.resolve_event(event.id)?;
            emitted += 1;
        }

        for command in self.store.commands_since(since)? {
            if !ALERTED_COMMAND_TYPES.contains(&command.command_type.as_str()) {
                continue;
            }
            if self.alerted_commands.contains(&command.command_id) {
                continue;
            }
            let key = format!("command_executed_{}", Severity::Medium);
            if !self.cooldown.should_send(&key) {
                continue;
            }

            let message = render("command_executed", &self.command_vars(&command));
            self.deliver("command_executed", Severity::Medium, &message).await;
            self.record_alert("command_executed", Severity::Medium, &message)?;
            self.alerted_commands.insert(command.command_id.clone());
            emitted += 1;
        }

        Ok(emitted)
    }

    async fn deliver(&self, alert_type: &str, severity: Severity, message: &str) {
        for transport in &self.transports {
            if let Err(e) = transport.send(alert_type, severity, message).await {
                warn!(
                    transport = transport.name(),
                    alert_type,
                    error = %e,
                    "alert delivery failed"
                );
            }
        }
    }

    fn record_alert(
        &self,
        alert_type: &str,
        severity: Severity,
        message: &str,
    ) -> Result<(), AgentError> {
        info!(alert_type, severity = %severity, "alert sent");
        self.store.insert_audit(
            "alert_sent",
            Some(alert_type),
            Some(&json!({
                "severity": severity,
                "message": message,
            })),
            Some("alerts"),
        )?;
        Ok(())
    }

    fn event_vars(&self, event: &SecurityEvent) -> Result<HashMap<String, String>, AgentError> {
        let mut vars = self.base_vars();
        vars.insert("severity".to_string(), event.severity.to_string());
        vars.insert("timestamp".to_string(), event.timestamp.to_rfc3339());
        vars.insert("description".to_string(), event.description.clone());
        vars.insert(
            "file_path".to_string(),
            event.file_path.clone().unwrap_or_default(),
        );
        vars.insert(
            "process_name".to_string(),
            event.process_name.clone().unwrap_or_default(),
        );

        // Metrics snapshot from the cache, the store being the only
        // channel between subsystems
        if let Some(sample) = self.store.latest_sample()? {
            vars.insert("cpu_percent".to_string(), format!("{:.1}", sample.cpu_percent));
            vars.insert(
                "memory_percent".to_string(),
                format!("{:.1}", sample.memory_percent),
            );
            vars.insert(
                "disk_percent".to_string(),
                format!("{:.1}", sample.disk_percent),
            );
            if let Some(ip) = sample.ip_address {
                vars.insert("ip_address".to_string(), ip);
            }
        }
        vars.entry("ip_address".to_string())
            .or_insert_with(|| "Unknown".to_string());
        vars.entry("cpu_percent".to_string()).or_insert_with(|| "0".to_string());
        vars.entry("memory_percent".to_string()).or_insert_with(|| "0".to_string());
        vars.entry("disk_percent".to_string()).or_insert_with(|| "0".to_string());
        Ok(vars)
    }

    fn command_vars(&self, command: &CommandRecord) -> HashMap<String, String> {
        let mut vars = self.base_vars();
        vars.insert("timestamp".to_string(), command.created_at.to_rfc3339());
        vars.insert("command_type".to_string(), command.command_type.clone());
        vars.insert("status".to_string(), command.status.to_string());
        vars.insert(
            "result".to_string(),
            command
                .result
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "pending".to_string()),
        );
        vars.insert(
            "description".to_string(),
            format!("Command {} {}", command.command_type, command.status),
        );
        vars
    }

    fn base_vars(&self) -> HashMap<String, String> {
        let device_name = self.config.lock().agent.name.clone();
        let mut vars = HashMap::new();
        vars.insert("device_id".to_string(), self.device_id.clone());
        vars.insert("device_name".to_string(), device_name);
        vars
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
