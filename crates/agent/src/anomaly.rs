// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Anomaly engine loop: keeps the model alive, scores the latest sample,
//! and runs the trend heuristics.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use pk_core::{NewSecurityEvent, Severity, TelemetrySample};
use pk_detect::{
    cpu_spike, memory_leak, synthetic_samples, AnomalyModel, ANOMALY_THRESHOLD,
    MAX_TRAINING_SAMPLES, MIN_TRAINING_SAMPLES,
};
use pk_storage::Store;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::AgentError;

const SCORE_INTERVAL: Duration = Duration::from_secs(60);
/// In-memory history cap
const MAX_HISTORY: usize = 1000;
const TRAINING_SEED: u64 = 42;

pub struct AnomalyLoop {
    store: Store,
    model_path: PathBuf,
    training_file: PathBuf,
    model: Option<AnomalyModel>,
    history: Vec<TelemetrySample>,
}

impl AnomalyLoop {
    pub fn new(store: Store, data_dir: &std::path::Path) -> Self {
        Self {
            store,
            model_path: data_dir.join("anomaly_model"),
            training_file: data_dir.join("training_data.json"),
            model: None,
            history: Vec::new(),
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(SCORE_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("anomaly engine started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick() {
                        error!(error = %e, "anomaly tick failed");
                    }
                }
            }
        }
        info!("anomaly engine stopped");
    }

    /// One scoring pass. Returns the number of events written.
    pub fn tick(&mut self) -> Result<usize, AgentError> {
        if self.model.is_none() {
            self.model = Some(self.load_or_train()?);
        }

        let Some(sample) = self.store.latest_sample()? else {
            return Ok(0);
        };

        let mut written = 0usize;
        written += self.score_sample(&sample)?;
        written += self.run_heuristics(&sample)?;

        self.history.push(sample);
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }

        self.maybe_retrain()?;
        Ok(written)
    }

    fn load_or_train(&self) -> Result<AnomalyModel, AgentError> {
        if let Some(model) = AnomalyModel::load(&self.model_path)? {
            info!(trained_on = model.trained_on, "loaded persisted anomaly model");
            return Ok(model);
        }

        let pool = self.training_pool()?;
        let model = AnomalyModel::train(&pool, TRAINING_SEED)?;
        model.save(&self.model_path)?;
        Ok(model)
    }

    /// Training pool: optional side file, then the cache, then synthetic
    /// rows when the total is still short.
    fn training_pool(&self) -> Result<Vec<TelemetrySample>, AgentError> {
        let mut pool: Vec<TelemetrySample> = Vec::new();

        if self.training_file.exists() {
            match std::fs::read_to_string(&self.training_file)
                .map_err(AgentError::from)
                .and_then(|raw| {
                    serde_json::from_str::<Vec<TelemetrySample>>(&raw).map_err(AgentError::from)
                }) {
                Ok(rows) => {
                    info!(rows = rows.len(), "loaded training data file");
                    pool.extend(rows);
                }
                Err(e) => {
                    warn!(error = %e, "ignoring unreadable training data file");
                }
            }
        }

        let mut cached = self.store.recent_samples(MAX_TRAINING_SAMPLES)?;
        cached.reverse(); // oldest first
        pool.extend(cached);

        if pool.len() < MIN_TRAINING_SAMPLES {
            info!(
                have = pool.len(),
                "insufficient training data, adding synthetic samples"
            );
            pool.extend(synthetic_samples(MIN_TRAINING_SAMPLES, TRAINING_SEED));
        }
        pool.truncate(MAX_TRAINING_SAMPLES);
        Ok(pool)
    }

    fn score_sample(&mut self, sample: &TelemetrySample) -> Result<usize, AgentError> {
        let Some(model) = &self.model else {
            return Ok(0);
        };
        let score = model.score(sample, &self.history);
        if !score.is_anomaly && score.value >= ANOMALY_THRESHOLD {
            return Ok(0);
        }

        let severity = if score.is_anomaly {
            Severity::High
        } else {
            Severity::Medium
        };
        let hour_ago = Utc::now() - chrono::Duration::hours(1);
        let file_operations = self
            .store
            .count_events_of_type_since("file_change", hour_ago)?;
        let error_rate = self
            .store
            .count_events_of_severity_since(Severity::High, hour_ago)?;

        warn!(score = score.value, flagged = score.is_anomaly, "anomaly detected");
        self.store.insert_security_event(
            &NewSecurityEvent::new(
                "anomaly_detected",
                severity,
                format!("System anomaly detected (score: {:.3})", score.value),
            )
            .with_details(json!({
                "anomaly_score": score.value,
                "is_anomaly": score.is_anomaly,
                "cpu_percent": sample.cpu_percent,
                "memory_percent": sample.memory_percent,
                "disk_percent": sample.disk_percent,
                "processes_count": sample.processes_count,
                "file_operations": file_operations,
                "error_rate": error_rate,
            })),
        )?;
        self.store.insert_audit(
            "anomaly_detected",
            Some("system"),
            Some(&json!({"score": score.value, "is_anomaly": score.is_anomaly})),
            Some("security"),
        )?;
        Ok(1)
    }

    fn run_heuristics(&self, sample: &TelemetrySample) -> Result<usize, AgentError> {
        let mut written = 0usize;
        if let Some(finding) = cpu_spike(&self.history, sample) {
            self.store
                .insert_security_event(&finding.to_security_event())?;
            written += 1;
        }
        if let Some(finding) = memory_leak(&self.history) {
            self.store
                .insert_security_event(&finding.to_security_event())?;
            written += 1;
        }
        Ok(written)
    }

    /// Retrain once the cache has grown by half again since the last fit.
    fn maybe_retrain(&mut self) -> Result<(), AgentError> {
        let Some(model) = &self.model else {
            return Ok(());
        };
        let pool_size = self.store.sample_count()? as usize;
        if pool_size < MIN_TRAINING_SAMPLES || pool_size < model.trained_on * 3 / 2 {
            return Ok(());
        }

        info!(pool_size, trained_on = model.trained_on, "retraining anomaly model");
        let pool = self.training_pool()?;
        let retrained = AnomalyModel::train(&pool, TRAINING_SEED)?;
        retrained.save(&self.model_path)?;
        self.model = Some(retrained);
        Ok(())
    }
}

#[cfg(test)]
#[path = "anomaly_tests.rs"]
mod tests;
