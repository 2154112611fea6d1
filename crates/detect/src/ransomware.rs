// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sliding-window heuristics over filesystem events.
//!
//! Every event lands in a ring holding the last five minutes. After each
//! append, the last 60 seconds are scanned; a detector whose count crosses
//! its threshold fires once and then stays quiet until the window that
//! triggered it has passed, so one burst produces one event per detector.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use pk_core::{NewSecurityEvent, Severity};
use pk_sensors::FsEventKind;
use serde_json::json;

/// Full ring retention
const RING_WINDOW: Duration = Duration::from_secs(300);
/// Detection window scanned after each append
const SCAN_WINDOW: Duration = Duration::from_secs(60);
/// How many paths a details blob carries at most
const MAX_LISTED_FILES: usize = 10;

/// Per-detector firing thresholds (counts per 60 s window)
#[derive(Debug, Clone)]
pub struct DetectorThresholds {
    pub mass_operations: usize,
    pub mass_renames: usize,
    pub suspicious_extensions: usize,
    pub encryption_patterns: usize,
    pub rapid_modifications: usize,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            mass_operations: 50,
            mass_renames: 30,
            suspicious_extensions: 10,
            encryption_patterns: 5,
            rapid_modifications: 20,
        }
    }
}

/// Filename fragments that look like post-encryption artifacts
pub const ENCRYPTION_PATTERNS: [&str; 4] = [".encrypted", ".locked", ".crypto", ".crypt"];

/// Ring configuration
#[derive(Debug, Clone)]
pub struct RansomwareConfig {
    pub suspicious_extensions: Vec<String>,
    pub thresholds: DetectorThresholds,
}

impl Default for RansomwareConfig {
    fn default() -> Self {
        Self {
            suspicious_extensions: [".exe", ".bat", ".cmd", ".scr", ".pif", ".com", ".vbs", ".js"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            thresholds: DetectorThresholds::default(),
        }
    }
}

/// The five window detectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Detector {
    MassFileOperations,
    MassRenames,
    SuspiciousExtensions,
    EncryptionPatterns,
    RapidModifications,
}

impl Detector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Detector::MassFileOperations => "mass_file_operations",
            Detector::MassRenames => "mass_renames",
            Detector::SuspiciousExtensions => "suspicious_extensions",
            Detector::EncryptionPatterns => "encryption_patterns",
            Detector::RapidModifications => "rapid_modifications",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Detector::MassFileOperations => Severity::High,
            Detector::MassRenames => Severity::High,
            Detector::SuspiciousExtensions => Severity::Medium,
            Detector::EncryptionPatterns => Severity::Critical,
            Detector::RapidModifications => Severity::High,
        }
    }
}

/// One detector firing
#[derive(Debug, Clone)]
pub struct Finding {
    pub detector: Detector,
    pub severity: Severity,
    pub description: String,
    pub details: serde_json::Value,
}

impl Finding {
    /// Security event row for this firing.
    pub fn to_security_event(&self) -> NewSecurityEvent {
        NewSecurityEvent::new("ransomware_detection", self.severity, self.description.clone())
            .with_details(self.details.clone())
    }
}

struct RingEntry {
    kind: FsEventKind,
    path: PathBuf,
    suspicious_extension: bool,
    encryption_pattern: bool,
    at: Instant,
}

/// In-memory ring of recent filesystem events with edge-triggered detectors.
///
/// Scratch state: losing it on restart only forgets the last five minutes.
pub struct EventRing {
    config: RansomwareConfig,
    events: VecDeque<RingEntry>,
    fired_at: HashMap<Detector, Instant>,
}

impl EventRing {
    pub fn new(config: RansomwareConfig) -> Self {
        Self {
            config,
            events: VecDeque::new(),
            fired_at: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append one event and evaluate all detectors over the last 60 s.
    pub fn record(&mut self, kind: FsEventKind, path: &Path, now: Instant) -> Vec<Finding> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();

        self.events.push_back(RingEntry {
            kind,
            path: path.to_path_buf(),
            suspicious_extension: self
                .config
                .suspicious_extensions
                .iter()
                .any(|s| s == &extension),
            encryption_pattern: ENCRYPTION_PATTERNS.iter().any(|p| name.contains(p)),
            at: now,
        });

        while let Some(front) = self.events.front() {
            if now.duration_since(front.at) >= RING_WINDOW {
                self.events.pop_front();
            } else {
                break;
            }
        }

        self.scan(now)
    }

    fn scan(&mut self, now: Instant) -> Vec<Finding> {
        // Counts and file lists are gathered first so the window borrow
        // ends before any detector mutates the fired-at map
        let (created, modified, moved, deleted, suspicious, encryption_files, modified_files) = {
            let window: Vec<&RingEntry> = self
                .events
                .iter()
                .filter(|e| now.duration_since(e.at) < SCAN_WINDOW)
                .collect();
            if window.is_empty() {
                return Vec::new();
            }

            let created = window.iter().filter(|e| e.kind == FsEventKind::Created).count();
            let modified = window.iter().filter(|e| e.kind == FsEventKind::Modified).count();
            let moved = window.iter().filter(|e| e.kind == FsEventKind::Moved).count();
            let deleted = window.iter().filter(|e| e.kind == FsEventKind::Deleted).count();
            let suspicious = window.iter().filter(|e| e.suspicious_extension).count();
            let encryption_files: Vec<String> = window
                .iter()
                .filter(|e| e.encryption_pattern)
                .map(|e| e.path.display().to_string())
                .collect();
            let modified_files: Vec<String> = window
                .iter()
                .filter(|e| e.kind == FsEventKind::Modified)
                .take(MAX_LISTED_FILES)
                .map(|e| e.path.display().to_string())
                .collect();
            (
                created,
                modified,
                moved,
                deleted,
                suspicious,
                encryption_files,
                modified_files,
            )
        };
        let total = created + modified + moved + deleted;

        let thresholds = self.config.thresholds.clone();
        let mut findings = Vec::new();

        if total > thresholds.mass_operations {
            self.fire(Detector::MassFileOperations, now, &mut findings, |detector| Finding {
                detector,
                severity: detector.severity(),
                description: format!(
                    "Mass file operations detected: {total} operations in 1 minute"
                ),
                details: json!({
                    "detector": detector.as_str(),
                    "created": created,
                    "modified": modified,
                    "moved": moved,
                    "deleted": deleted,
                    "total": total,
                    "threshold": thresholds.mass_operations,
                }),
            });
        }

        if moved > thresholds.mass_renames {
            self.fire(Detector::MassRenames, now, &mut findings, |detector| Finding {
                detector,
                severity: detector.severity(),
                description: format!("Mass file renames detected: {moved} renames in 1 minute"),
                details: json!({
                    "detector": detector.as_str(),
                    "count": moved,
                    "threshold": thresholds.mass_renames,
                }),
            });
        }

        if suspicious > thresholds.suspicious_extensions {
            self.fire(Detector::SuspiciousExtensions, now, &mut findings, |detector| Finding {
                detector,
                severity: detector.severity(),
                description: format!(
                    "Many suspicious file extensions detected: {suspicious} files in 1 minute"
                ),
                details: json!({
                    "detector": detector.as_str(),
                    "count": suspicious,
                    "threshold": thresholds.suspicious_extensions,
                }),
            });
        }

        if encryption_files.len() > thresholds.encryption_patterns {
            let files = encryption_files;
            let count = files.len();
            self.fire(Detector::EncryptionPatterns, now, &mut findings, |detector| Finding {
                detector,
                severity: detector.severity(),
                description: format!(
                    "Encryption patterns detected: {count} files with encryption-like names"
                ),
                details: json!({
                    "detector": detector.as_str(),
                    "count": count,
                    "files": files,
                }),
            });
        }

        if modified > thresholds.rapid_modifications {
            let files = modified_files;
            self.fire(Detector::RapidModifications, now, &mut findings, |detector| Finding {
                detector,
                severity: detector.severity(),
                description: format!(
                    "Rapid file modifications detected: {modified} files modified in 1 minute"
                ),
                details: json!({
                    "detector": detector.as_str(),
                    "count": modified,
                    "files": files,
                }),
            });
        }

        findings
    }

    fn fire(
        &mut self,
        detector: Detector,
        now: Instant,
        findings: &mut Vec<Finding>,
        build: impl FnOnce(Detector) -> Finding,
    ) {
        if let Some(last) = self.fired_at.get(&detector) {
            if now.duration_since(*last) < SCAN_WINDOW {
                return;
            }
        }
        self.fired_at.insert(detector, now);
        findings.push(build(detector));
    }
}

#[cfg(test)]
#[path = "ransomware_tests.rs"]
mod tests;
