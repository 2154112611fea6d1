// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn process(name: &str, cmdline: &str, cpu: f32) -> ProcessInfo {
    ProcessInfo {
        pid: 4242,
        name: name.to_string(),
        cmdline: cmdline.to_string(),
        cpu_percent: cpu,
        memory_percent: 10.0,
        exe: None,
    }
}

#[parameterized(
    in_name = { "cryptolocker.exe", "" },
    in_cmdline = { "helper.exe", "helper.exe --ransom-note /tmp/note.txt" },
    keylogger = { "keylogger", "" },
)]
fn suspicious_patterns_flag_high(name: &str, cmdline: &str) {
    let findings = evaluate_process(&process(name, cmdline, 1.0), &default_safe_list());
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].kind, ProcessFindingKind::SuspiciousProcess);
    assert_eq!(findings[0].severity, Severity::High);
}

#[test]
fn safe_listed_name_is_exempt() {
    // "lockapp.exe" contains "lock" but sits on the safe list
    let findings = evaluate_process(&process("lockapp.exe", "", 1.0), &default_safe_list());
    assert!(findings.is_empty());
}

#[test]
fn plain_process_is_quiet() {
    let findings = evaluate_process(&process("cargo", "cargo build", 12.0), &default_safe_list());
    assert!(findings.is_empty());
}

#[test]
fn high_cpu_flags_medium() {
    let findings = evaluate_process(&process("ffmpeg", "ffmpeg -i in.mkv", 93.0), &default_safe_list());
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].kind, ProcessFindingKind::HighResourceUsage);
    assert_eq!(findings[0].severity, Severity::Medium);
    assert_eq!(findings[0].details["cpu_percent"].as_f64().unwrap() as f32, 93.0);
}

#[test]
fn idle_process_never_flags_high_cpu() {
    let findings = evaluate_process(
        &process("System Idle Process", "", 99.0),
        &default_safe_list(),
    );
    assert!(findings.is_empty());
}

#[test]
fn suspicious_and_high_cpu_both_fire() {
    let findings = evaluate_process(&process("encryptor", "", 95.0), &default_safe_list());
    assert_eq!(findings.len(), 2);
}

#[test]
fn empty_name_is_skipped() {
    let findings = evaluate_process(&process("  ", "", 99.0), &default_safe_list());
    assert!(findings.is_empty());
}

#[test]
fn finding_converts_to_event_with_process_name() {
    let findings = evaluate_process(&process("ransom32", "", 0.0), &default_safe_list());
    let event = findings[0].to_security_event();
    assert_eq!(event.event_type, "suspicious_process");
    assert_eq!(event.process_name.as_deref(), Some("ransom32"));
}
