// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Anomaly model lifecycle: train, persist, load, score.
//!
//! The persisted artifact is one JSON document holding the forest, the
//! scaler, the feature column list and training metadata, written with an
//! atomic temp-file rename.

use std::path::Path;

use chrono::{DateTime, Utc};
use pk_core::TelemetrySample;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::features::{extract_current, extract_matrix, FEATURE_COLUMNS};
use crate::forest::{IsolationForest, StandardScaler};

pub const MIN_TRAINING_SAMPLES: usize = 100;
pub const MAX_TRAINING_SAMPLES: usize = 10_000;
pub const CONTAMINATION: f64 = 0.05;
pub const N_ESTIMATORS: usize = 100;
/// Decision values below this are reported even when the forest itself
/// does not flag the point
pub const ANOMALY_THRESHOLD: f64 = -0.3;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("model io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("not enough training data: {got} samples, need {need}")]
    NotEnoughData { got: usize, need: usize },
}

/// Result of scoring one sample
#[derive(Debug, Clone, Copy)]
pub struct Score {
    /// Decision value; negative means the forest flagged the point
    pub value: f64,
    pub is_anomaly: bool,
}

/// Trained model plus its scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyModel {
    pub forest: IsolationForest,
    pub scaler: StandardScaler,
    pub feature_columns: Vec<String>,
    pub trained_at: DateTime<Utc>,
    /// Size of the pool the model was fit on; retraining triggers once the
    /// pool has grown by half again
    pub trained_on: usize,
}

impl AnomalyModel {
    /// Fit the scaler and forest on `samples` (oldest first).
    pub fn train(samples: &[TelemetrySample], seed: u64) -> Result<Self, DetectError> {
        if samples.len() < MIN_TRAINING_SAMPLES {
            return Err(DetectError::NotEnoughData {
                got: samples.len(),
                need: MIN_TRAINING_SAMPLES,
            });
        }

        let matrix = extract_matrix(samples);
        let scaler = StandardScaler::fit(&matrix);
        let scaled = scaler.transform(&matrix);
        let forest = IsolationForest::fit(&scaled, N_ESTIMATORS, CONTAMINATION, seed);

        info!(samples = samples.len(), "anomaly model trained");
        Ok(Self {
            forest,
            scaler,
            feature_columns: FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect(),
            trained_at: Utc::now(),
            trained_on: samples.len(),
        })
    }

    /// Score one sample against the model.
    pub fn score(&self, sample: &TelemetrySample, history: &[TelemetrySample]) -> Score {
        let row = self.scaler.transform_row(&extract_current(sample, history));
        let value = self.forest.decision_function(&row);
        Score {
            value,
            is_anomaly: value < 0.0,
        }
    }

    /// Persist as JSON with an atomic rename.
    pub fn save(&self, path: &Path) -> Result<(), DetectError> {
        let raw = serde_json::to_vec(self)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load a persisted model; `None` when no artifact exists, and also on
    /// an unreadable artifact (which is logged and left for retraining to
    /// replace).
    pub fn load(path: &Path) -> Result<Option<Self>, DetectError> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read(path)?;
        match serde_json::from_slice(&raw) {
            Ok(model) => Ok(Some(model)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable model artifact");
                Ok(None)
            }
        }
    }
}

/// Synthetic normal-behavior samples used when the cache is too small to
/// train on. Distributions: cpu N(30,15), memory N(50,20), disk N(60,25),
/// processes N(150,30), uptime U(3600, 86400).
pub fn synthetic_samples(n: usize, seed: u64) -> Vec<TelemetrySample> {
    fn normal(rng: &mut StdRng, mean: f64, std: f64) -> f64 {
        match Normal::new(mean, std) {
            Ok(dist) => dist.sample(rng),
            Err(_) => mean,
        }
    }
    fn uniform(rng: &mut StdRng, lo: f64, hi: f64) -> f64 {
        match Uniform::new(lo, hi) {
            Ok(dist) => dist.sample(rng),
            Err(_) => lo,
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let now = Utc::now();
    (0..n)
        .map(|i| TelemetrySample {
            timestamp: now - chrono::Duration::seconds((n - i) as i64 * 300),
            cpu_percent: normal(&mut rng, 30.0, 15.0).clamp(0.0, 100.0),
            memory_percent: normal(&mut rng, 50.0, 20.0).clamp(0.0, 100.0),
            disk_percent: normal(&mut rng, 60.0, 25.0).clamp(0.0, 100.0),
            processes_count: normal(&mut rng, 150.0, 30.0).max(1.0) as i64,
            uptime_seconds: uniform(&mut rng, 3600.0, 86400.0) as i64,
            ip_address: None,
            network_io: serde_json::Value::Null,
        })
        .collect()
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
