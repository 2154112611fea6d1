// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert message templates.
//!
//! Each event type has a title and a body with `{variable}` placeholders.
//! A body that references a variable the caller did not provide degrades to
//! the default format instead of failing the alert.

use std::collections::HashMap;

fn template_for(alert_type: &str) -> Option<(&'static str, &'static str)> {
    match alert_type {
        "ransomware_detection" => Some((
            "🚨 RANSOMWARE DETECTED",
            "Ransomware activity detected on device {device_name}!\n\n\
             Severity: {severity}\n\
             Time: {timestamp}\n\
             Description: {description}\n\n\
             Immediate action required! Please check the device and take \
             appropriate security measures.\n\n\
             Device ID: {device_id}\n\
             IP Address: {ip_address}",
        )),
        "anomaly_detected" | "heuristic_anomaly" => Some((
            "⚠️ System Anomaly Detected",
            "Unusual system behavior detected on device {device_name}.\n\n\
             Severity: {severity}\n\
             Time: {timestamp}\n\
             Description: {description}\n\n\
             System Status:\n\
             - CPU Usage: {cpu_percent}%\n\
             - Memory Usage: {memory_percent}%\n\
             - Disk Usage: {disk_percent}%\n\n\
             Device ID: {device_id}\n\
             IP Address: {ip_address}",
        )),
        "threshold_violation" => Some((
            "📊 Resource Threshold Exceeded",
            "System resource threshold exceeded on device {device_name}.\n\n\
             Severity: {severity}\n\
             Time: {timestamp}\n\
             Description: {description}\n\n\
             Device ID: {device_id}\n\
             IP Address: {ip_address}",
        )),
        "suspicious_process" => Some((
            "🔍 Suspicious Process",
            "A suspicious process was detected on device {device_name}.\n\n\
             Severity: {severity}\n\
             Time: {timestamp}\n\
             Process: {process_name}\n\
             Description: {description}\n\n\
             Device ID: {device_id}",
        )),
        "high_resource_usage" => Some((
            "📈 High Resource Usage",
            "A process is consuming unusual resources on device {device_name}.\n\n\
             Time: {timestamp}\n\
             Process: {process_name}\n\
             Description: {description}\n\n\
             Device ID: {device_id}",
        )),
        "file_isolated" => Some((
            "🔒 File Quarantined",
            "A file was moved to quarantine on device {device_name}.\n\n\
             Time: {timestamp}\n\
             File: {file_path}\n\
             Description: {description}\n\n\
             Device ID: {device_id}",
        )),
        "command_executed" => Some((
            "🔧 Command Executed",
            "Command executed on device {device_name}.\n\n\
             Command: {command_type}\n\
             Status: {status}\n\
             Result: {result}\n\n\
             Device ID: {device_id}\n\
             Time: {timestamp}",
        )),
        _ => None,
    }
}

/// Render the message for `alert_type` from `vars`.
pub fn render(alert_type: &str, vars: &HashMap<String, String>) -> String {
    let Some((title, body)) = template_for(alert_type) else {
        return default_format(alert_type, vars);
    };

    match substitute(body, vars) {
        Ok(rendered) => format!("{title}\n\n{rendered}"),
        Err(missing) => {
            tracing::warn!(alert_type, missing, "template variable missing");
            default_format(alert_type, vars)
        }
    }
}

fn default_format(alert_type: &str, vars: &HashMap<String, String>) -> String {
    let get = |key: &str| vars.get(key).cloned().unwrap_or_else(|| "Unknown".to_string());
    format!(
        "Alert: {alert_type}\nDevice: {}\nTime: {}\nDescription: {}",
        get("device_name"),
        get("timestamp"),
        get("description"),
    )
}

/// Replace `{name}` placeholders; errors with the first missing name.
fn substitute(template: &str, vars: &HashMap<String, String>) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push('{');
            rest = after;
            continue;
        };
        let name = &after[..close];
        match vars.get(name) {
            Some(value) => out.push_str(value),
            None => return Err(name.to_string()),
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
