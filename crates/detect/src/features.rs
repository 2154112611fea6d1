// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Feature extraction for the anomaly model

use chrono::{Datelike, Timelike};
use pk_core::TelemetrySample;

/// Columns of the feature matrix, in order
pub const FEATURE_COLUMNS: [&str; 10] = [
    "cpu_percent",
    "memory_percent",
    "disk_percent",
    "processes_count",
    "cpu_memory_ratio",
    "resource_usage",
    "hour_of_day",
    "day_of_week",
    "cpu_rolling_mean",
    "memory_rolling_std",
];

const ROLLING_WINDOW: usize = 5;
/// Rolling statistics only kick in once this much history exists
const MIN_HISTORY_FOR_ROLLING: usize = 10;

fn finite(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn base_features(sample: &TelemetrySample) -> [f64; 8] {
    let cpu = finite(sample.cpu_percent);
    let memory = finite(sample.memory_percent);
    let disk = finite(sample.disk_percent);
    let processes = sample.processes_count as f64;
    [
        cpu,
        memory,
        disk,
        processes,
        finite(cpu / (memory + 1.0)),
        (cpu + memory + disk) / 3.0,
        f64::from(sample.timestamp.hour()),
        f64::from(sample.timestamp.weekday().num_days_from_monday()),
    ]
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Feature matrix over a training set, oldest row first. Rolling statistics
/// run across the rows with a window of 5.
pub fn extract_matrix(samples: &[TelemetrySample]) -> Vec<Vec<f64>> {
    let use_rolling = samples.len() > MIN_HISTORY_FOR_ROLLING;
    samples
        .iter()
        .enumerate()
        .map(|(i, sample)| {
            let base = base_features(sample);
            let mut row = base.to_vec();
            if use_rolling {
                let start = i.saturating_sub(ROLLING_WINDOW - 1);
                let cpu_window: Vec<f64> = samples[start..=i]
                    .iter()
                    .map(|s| finite(s.cpu_percent))
                    .collect();
                let memory_window: Vec<f64> = samples[start..=i]
                    .iter()
                    .map(|s| finite(s.memory_percent))
                    .collect();
                row.push(mean(&cpu_window));
                row.push(finite(sample_std(&memory_window)));
            } else {
                row.push(base[0]);
                row.push(0.0);
            }
            row
        })
        .collect()
}

/// Feature vector for the sample being scored, given the in-memory history
/// (oldest first, not including `sample`).
pub fn extract_current(sample: &TelemetrySample, history: &[TelemetrySample]) -> Vec<f64> {
    let base = base_features(sample);
    let mut row = base.to_vec();

    if history.len() >= MIN_HISTORY_FOR_ROLLING {
        let start = history.len().saturating_sub(ROLLING_WINDOW - 1);
        let mut cpu_window: Vec<f64> = history[start..]
            .iter()
            .map(|s| finite(s.cpu_percent))
            .collect();
        cpu_window.push(base[0]);
        let mut memory_window: Vec<f64> = history[start..]
            .iter()
            .map(|s| finite(s.memory_percent))
            .collect();
        memory_window.push(base[1]);

        row.push(mean(&cpu_window));
        row.push(finite(sample_std(&memory_window)));
    } else {
        row.push(base[0]);
        row.push(0.0);
    }
    row
}

#[cfg(test)]
#[path = "features_tests.rs"]
mod tests;
