// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process table heuristics

use std::collections::HashSet;

use pk_core::{NewSecurityEvent, Severity};
use pk_sensors::ProcessInfo;
use serde_json::json;

/// Name fragments that mark a process as suspicious
pub const SUSPICIOUS_NAME_PATTERNS: [&str; 11] = [
    "crypt",
    "encrypt",
    "lock",
    "ransom",
    "malware",
    "virus",
    "backdoor",
    "trojan",
    "worm",
    "keylogger",
    "rootkit",
];

const HIGH_CPU_THRESHOLD: f32 = 80.0;

/// Well-known OS, browser and shell processes exempt from name matching.
pub fn default_safe_list() -> HashSet<String> {
    [
        // Windows system surface
        "system idle process",
        "system",
        "csrss",
        "csrss.exe",
        "winlogon",
        "winlogon.exe",
        "wininit",
        "services",
        "services.exe",
        "lsass",
        "lsass.exe",
        "svchost",
        "svchost.exe",
        "explorer",
        "explorer.exe",
        "dwm",
        "dwm.exe",
        "conhost",
        "conhost.exe",
        "searchapp",
        "searchapp.exe",
        "shellexperiencehost",
        "shellexperiencehost.exe",
        "runtimebroker",
        "runtimebroker.exe",
        "dllhost",
        "dllhost.exe",
        "wmiprvse",
        "wmiprvse.exe",
        "taskhostw",
        "taskhostw.exe",
        "audiodg",
        "audiodg.exe",
        "spoolsv",
        "spoolsv.exe",
        "lockapp",
        "lockapp.exe",
        // Unix system surface
        "init",
        "systemd",
        "kthreadd",
        "launchd",
        "sshd",
        "cron",
        "dbus-daemon",
        "rsyslogd",
        // Browsers and common apps
        "chrome",
        "firefox",
        "msedge",
        "msedgewebview2",
        "msedgewebview2.exe",
        "slack",
        "slack.exe",
        "notepad",
        "calc",
        // Shells
        "bash",
        "zsh",
        "sh",
        "fish",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Kind of process finding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessFindingKind {
    SuspiciousProcess,
    HighResourceUsage,
}

impl ProcessFindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessFindingKind::SuspiciousProcess => "suspicious_process",
            ProcessFindingKind::HighResourceUsage => "high_resource_usage",
        }
    }
}

/// One flagged process
#[derive(Debug, Clone)]
pub struct ProcessFinding {
    pub kind: ProcessFindingKind,
    pub severity: Severity,
    pub description: String,
    pub process_name: String,
    pub details: serde_json::Value,
}

impl ProcessFinding {
    pub fn to_security_event(&self) -> NewSecurityEvent {
        NewSecurityEvent::new(self.kind.as_str(), self.severity, self.description.clone())
            .with_process_name(self.process_name.clone())
            .with_details(self.details.clone())
    }
}

/// Evaluate one process against the suspicion rules.
pub fn evaluate_process(info: &ProcessInfo, safe_list: &HashSet<String>) -> Vec<ProcessFinding> {
    let mut findings = Vec::new();
    let name = info.name.trim().to_lowercase();
    if name.is_empty() {
        return findings;
    }

    let is_idle = name.contains("idle");
    let cmdline = info.cmdline.to_lowercase();

    let name_matches = SUSPICIOUS_NAME_PATTERNS.iter().any(|p| name.contains(p));
    let cmdline_matches = SUSPICIOUS_NAME_PATTERNS.iter().any(|p| cmdline.contains(p));

    if (name_matches || cmdline_matches) && !safe_list.contains(&name) && !is_idle {
        findings.push(ProcessFinding {
            kind: ProcessFindingKind::SuspiciousProcess,
            severity: Severity::High,
            description: format!("Suspicious process detected: {}", info.name),
            process_name: info.name.clone(),
            details: json!({
                "pid": info.pid,
                "exe": info.exe.as_ref().map(|p| p.display().to_string()),
                "cmdline": info.cmdline,
            }),
        });
    }

    // The idle process legitimately reports near-100% CPU
    if info.cpu_percent > HIGH_CPU_THRESHOLD && !is_idle {
        findings.push(ProcessFinding {
            kind: ProcessFindingKind::HighResourceUsage,
            severity: Severity::Medium,
            description: format!(
                "High CPU usage: {} ({:.1}%)",
                info.name, info.cpu_percent
            ),
            process_name: info.name.clone(),
            details: json!({
                "pid": info.pid,
                "cpu_percent": info.cpu_percent,
                "memory_percent": info.memory_percent,
            }),
        });
    }

    findings
}

#[cfg(test)]
#[path = "process_rules_tests.rs"]
mod tests;
