// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trend heuristics over the in-memory sample history

use pk_core::{NewSecurityEvent, Severity, TelemetrySample};
use serde_json::json;

/// One heuristic detection
#[derive(Debug, Clone)]
pub struct HeuristicFinding {
    pub kind: &'static str,
    pub severity: Severity,
    pub description: String,
    pub details: serde_json::Value,
}

impl HeuristicFinding {
    pub fn to_security_event(&self) -> NewSecurityEvent {
        NewSecurityEvent::new("heuristic_anomaly", self.severity, self.description.clone())
            .with_details(self.details.clone())
    }
}

/// CPU spike: current more than twice the mean of the last 5 samples and
/// above 50%.
pub fn cpu_spike(history: &[TelemetrySample], current: &TelemetrySample) -> Option<HeuristicFinding> {
    if history.len() <= 5 {
        return None;
    }
    let recent: Vec<f64> = history
        .iter()
        .rev()
        .take(5)
        .map(|s| s.cpu_percent)
        .collect();
    let avg = recent.iter().sum::<f64>() / recent.len() as f64;
    let cpu = current.cpu_percent;

    if cpu > avg * 2.0 && cpu > 50.0 {
        Some(HeuristicFinding {
            kind: "cpu_spike",
            severity: Severity::Medium,
            description: format!("CPU usage spike: {cpu:.1}% (avg: {avg:.1}%)"),
            details: json!({
                "type": "cpu_spike",
                "current": cpu,
                "average": avg,
            }),
        })
    } else {
        None
    }
}

/// Memory leak: regression slope over the last 10 memory samples above 2
/// percentage points per sample while usage is already past 70%.
pub fn memory_leak(history: &[TelemetrySample]) -> Option<HeuristicFinding> {
    if history.len() <= 10 {
        return None;
    }
    let values: Vec<f64> = history
        .iter()
        .rev()
        .take(10)
        .rev()
        .map(|s| s.memory_percent)
        .collect();
    let trend = linreg_slope(&values);
    let current = *values.last()?;

    if trend > 2.0 && current > 70.0 {
        Some(HeuristicFinding {
            kind: "memory_leak",
            severity: Severity::High,
            description: format!(
                "Potential memory leak detected: {current:.1}% usage with increasing trend"
            ),
            details: json!({
                "type": "memory_leak",
                "trend": trend,
                "current_usage": current,
            }),
        })
    } else {
        None
    }
}

/// Least-squares slope of `values` against their indices.
pub fn linreg_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n_f;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

#[cfg(test)]
#[path = "heuristics_tests.rs"]
mod tests;
