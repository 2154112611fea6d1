// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pk-detect: behavioral detection.
//!
//! Two families of detectors live here: sliding-window heuristics over
//! filesystem events (ransomware-shaped bursts) and an unsupervised
//! outlier model over telemetry, with a couple of cheap trend heuristics
//! on the side.

pub mod features;
pub mod forest;
pub mod heuristics;
pub mod model;
pub mod process_rules;
pub mod ransomware;

pub use forest::{IsolationForest, StandardScaler};
pub use heuristics::{cpu_spike, memory_leak, HeuristicFinding};
pub use model::{
    synthetic_samples, AnomalyModel, DetectError, Score, ANOMALY_THRESHOLD, CONTAMINATION,
    MAX_TRAINING_SAMPLES, MIN_TRAINING_SAMPLES, N_ESTIMATORS,
};
pub use process_rules::{default_safe_list, evaluate_process, ProcessFinding, ProcessFindingKind};
pub use ransomware::{Detector, DetectorThresholds, EventRing, Finding, RansomwareConfig};
