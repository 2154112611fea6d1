// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry sampler: periodic host metrics into the cache and, when the
//! backend is unreachable, into the offline queue.

use std::time::Duration;

use chrono::Utc;
use pk_api::Backend;
use pk_core::{NewSecurityEvent, QueueType, Severity, TelemetrySample};
use pk_sensors::{HostMonitor, HostSnapshot};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::AgentContext;
use crate::error::AgentError;

pub struct Sampler<B: Backend, H: HostMonitor> {
    ctx: AgentContext<B, H>,
    interval: Duration,
}

impl<B: Backend, H: HostMonitor> Sampler<B, H> {
    pub fn new(ctx: AgentContext<B, H>) -> Self {
        let interval = Duration::from_secs(ctx.config.lock().saas.heartbeat_interval);
        Self { ctx, interval }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "telemetry sampler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "telemetry tick failed");
                    }
                }
            }
        }
        info!("telemetry sampler stopped");
    }

    /// One sampling pass: collect, cache, threshold-check, heartbeat.
    pub async fn tick(&self) -> Result<(), AgentError> {
        let snapshot = self.ctx.host.snapshot().await?;

        let sample = TelemetrySample {
            timestamp: Utc::now(),
            cpu_percent: snapshot.cpu_percent,
            memory_percent: snapshot.memory_percent,
            disk_percent: snapshot.max_disk_percent(),
            processes_count: snapshot.processes_count as i64,
            uptime_seconds: snapshot.uptime_seconds as i64,
            ip_address: snapshot.ip_address.clone(),
            network_io: serde_json::to_value(&snapshot.network)?,
        };
        self.ctx.store.insert_sample(&sample)?;

        self.check_thresholds(&sample)?;

        let payload = self.heartbeat_payload(&snapshot, &sample);
        match self.ctx.backend.heartbeat(&payload).await {
            Ok(()) => {
                self.ctx.store.touch_heartbeat(&self.ctx.device_id)?;
                debug!("heartbeat sent");
            }
            Err(e) => {
                warn!(error = %e, "heartbeat failed, queueing telemetry");
                self.ctx.store.enqueue(
                    QueueType::Telemetry,
                    &payload,
                    QueueType::Telemetry.priority(),
                )?;
            }
        }
        Ok(())
    }

    fn check_thresholds(&self, sample: &TelemetrySample) -> Result<(), AgentError> {
        let (cpu_threshold, memory_threshold, disk_threshold) = {
            let config = self.ctx.config.lock();
            (
                config.monitoring.cpu_threshold,
                config.monitoring.memory_threshold,
                config.monitoring.disk_threshold,
            )
        };

        let mut violations: Vec<(Severity, String, Value)> = Vec::new();
        if sample.cpu_percent > cpu_threshold {
            violations.push((
                Severity::Medium,
                format!(
                    "High CPU usage: {:.1}% (threshold: {cpu_threshold}%)",
                    sample.cpu_percent
                ),
                json!({
                    "resource_type": "CPU",
                    "current_value": sample.cpu_percent,
                    "threshold": cpu_threshold,
                }),
            ));
        }
        if sample.memory_percent > memory_threshold {
            violations.push((
                Severity::Medium,
                format!(
                    "High memory usage: {:.1}% (threshold: {memory_threshold}%)",
                    sample.memory_percent
                ),
                json!({
                    "resource_type": "Memory",
                    "current_value": sample.memory_percent,
                    "threshold": memory_threshold,
                }),
            ));
        }
        if sample.disk_percent > disk_threshold {
            violations.push((
                Severity::High,
                format!(
                    "High disk usage: {:.1}% (threshold: {disk_threshold}%)",
                    sample.disk_percent
                ),
                json!({
                    "resource_type": "Disk",
                    "current_value": sample.disk_percent,
                    "threshold": disk_threshold,
                }),
            ));
        }

        for (severity, description, details) in violations {
            self.ctx.store.insert_security_event(
                &NewSecurityEvent::new("threshold_violation", severity, description)
                    .with_details(details),
            )?;
        }
        Ok(())
    }

    fn heartbeat_payload(&self, snapshot: &HostSnapshot, sample: &TelemetrySample) -> Value {
        json!({
            "timestamp": sample.timestamp.to_rfc3339(),
            "device_id": self.ctx.device_id,
            "uptime_seconds": sample.uptime_seconds,
            "cpu": { "percent": sample.cpu_percent },
            "memory": { "percent": sample.memory_percent },
            "disk": snapshot
                .disks
                .iter()
                .map(|d| (d.mount_point.clone(), json!({
                    "total": d.total_bytes,
                    "free": d.available_bytes,
                    "percent": d.percent,
                })))
                .collect::<serde_json::Map<String, Value>>(),
            "network": sample.network_io,
            "processes": { "count": sample.processes_count },
            "network_info": { "ip_address": sample.ip_address },
            "system": {
                "platform": snapshot.platform,
                "hostname": snapshot.hostname,
            },
        })
    }
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
