// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn train_refuses_small_pools() {
    let samples = synthetic_samples(10, 42);
    let err = AnomalyModel::train(&samples, 42).unwrap_err();
    assert!(matches!(
        err,
        DetectError::NotEnoughData { got: 10, need: 100 }
    ));
}

#[test]
fn trained_model_scores_normal_behavior_as_normal() {
    let samples = synthetic_samples(500, 42);
    let model = AnomalyModel::train(&samples, 42).unwrap();

    // A sample straight from the training distribution
    let normal = &samples[250];
    let score = model.score(normal, &samples[..250]);
    assert!(!score.is_anomaly, "decision {}", score.value);
}

#[test]
fn trained_model_flags_extreme_sample() {
    let samples = synthetic_samples(500, 42);
    let model = AnomalyModel::train(&samples, 42).unwrap();

    let mut weird = samples[0].clone();
    weird.cpu_percent = 100.0;
    weird.memory_percent = 100.0;
    weird.disk_percent = 100.0;
    weird.processes_count = 5000;

    let score = model.score(&weird, &samples[..100]);
    assert!(
        score.is_anomaly || score.value < ANOMALY_THRESHOLD,
        "decision {}",
        score.value
    );
}

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("anomaly_model");

    let samples = synthetic_samples(200, 42);
    let model = AnomalyModel::train(&samples, 42).unwrap();
    model.save(&path).unwrap();

    let loaded = AnomalyModel::load(&path).unwrap().unwrap();
    assert_eq!(loaded.trained_on, 200);
    assert_eq!(loaded.feature_columns.len(), 10);

    let score_a = model.score(&samples[0], &[]);
    let score_b = loaded.score(&samples[0], &[]);
    assert_eq!(score_a.value, score_b.value);
}

#[test]
fn load_missing_artifact_is_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(AnomalyModel::load(&dir.path().join("anomaly_model"))
        .unwrap()
        .is_none());
}

#[test]
fn load_garbage_artifact_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("anomaly_model");
    std::fs::write(&path, b"not json at all").unwrap();
    assert!(AnomalyModel::load(&path).unwrap().is_none());
}

#[test]
fn synthetic_samples_are_deterministic_and_bounded() {
    let a = synthetic_samples(100, 42);
    let b = synthetic_samples(100, 42);
    assert_eq!(a.len(), 100);
    assert_eq!(a[0].cpu_percent, b[0].cpu_percent);
    assert!(a.iter().all(|s| (0.0..=100.0).contains(&s.cpu_percent)));
    assert!(a
        .iter()
        .all(|s| (3600..=86400).contains(&s.uptime_seconds)));
}
