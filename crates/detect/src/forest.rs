// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Standard scaler and isolation forest.
//!
//! The forest follows the standard construction: each tree is grown on a
//! random subsample (at most 256 rows) with uniformly random axis-aligned
//! splits, and the anomaly score is `2^(-E[h(x)]/c(ψ))` over the average
//! path length. Scores are reported as decision values offset by the
//! contamination quantile of the training scores, so a negative decision
//! means "flagged", matching the usual `contamination` semantics.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Zero-mean unit-variance feature scaling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit on a row-major matrix. Zero-variance columns degrade to identity.
    pub fn fit(matrix: &[Vec<f64>]) -> Self {
        let dims = matrix.first().map(Vec::len).unwrap_or(0);
        let n = matrix.len().max(1) as f64;

        let mut means = vec![0.0; dims];
        for row in matrix {
            for (i, v) in row.iter().enumerate() {
                means[i] += v;
            }
        }
        for m in &mut means {
            *m /= n;
        }

        let mut stds = vec![0.0; dims];
        for row in matrix {
            for (i, v) in row.iter().enumerate() {
                stds[i] += (v - means[i]).powi(2);
            }
        }
        for s in &mut stds {
            *s = (*s / n).sqrt();
            if *s == 0.0 || !s.is_finite() {
                *s = 1.0;
            }
        }

        Self { means, stds }
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(i, v)| (v - self.means.get(i).unwrap_or(&0.0)) / self.stds.get(i).unwrap_or(&1.0))
            .collect()
    }

    pub fn transform(&self, matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
        matrix.iter().map(|row| self.transform_row(row)).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Unsupervised outlier scorer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
    offset: f64,
}

/// Average path length of an unsuccessful BST search over `n` nodes
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    const EULER: f64 = 0.577_215_664_901_532_9;
    2.0 * ((n - 1.0).ln() + EULER) - 2.0 * (n - 1.0) / n
}

fn build_tree(data: &[Vec<f64>], indices: &mut [usize], depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
    if indices.len() <= 1 || depth >= max_depth {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let dims = data[indices[0]].len();
    let feature = rng.random_range(0..dims);
    let (min, max) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
        let v = data[i][feature];
        (lo.min(v), hi.max(v))
    });
    if max <= min {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let threshold = rng.random_range(min..max);
    let split = partition_in_place(indices, |&i| data[i][feature] < threshold);
    let (left_idx, right_idx) = indices.split_at_mut(split);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(data, left_idx, depth + 1, max_depth, rng)),
        right: Box::new(build_tree(data, right_idx, depth + 1, max_depth, rng)),
    }
}

/// In-place stable-enough partition; returns the index of the first element
/// for which the predicate is false.
fn partition_in_place(indices: &mut [usize], pred: impl Fn(&usize) -> bool) -> usize {
    let mut split = 0;
    for i in 0..indices.len() {
        if pred(&indices[i]) {
            indices.swap(split, i);
            split += 1;
        }
    }
    split
}

fn path_length(node: &Node, x: &[f64], depth: f64) -> f64 {
    match node {
        Node::Leaf { size } => depth + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if x.get(*feature).copied().unwrap_or(0.0) < *threshold {
                path_length(left, x, depth + 1.0)
            } else {
                path_length(right, x, depth + 1.0)
            }
        }
    }
}

impl IsolationForest {
    /// Fit `n_trees` trees on `data` with the given contamination and seed.
    pub fn fit(data: &[Vec<f64>], n_trees: usize, contamination: f64, seed: u64) -> Self {
        let n = data.len();
        let sample_size = n.min(256);
        if sample_size < 2 {
            return Self {
                trees: Vec::new(),
                sample_size: 2,
                offset: -0.5,
            };
        }
        let max_depth = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(seed);

        let mut trees = Vec::with_capacity(n_trees);
        for _ in 0..n_trees {
            let mut indices = rand::seq::index::sample(&mut rng, n, sample_size).into_vec();
            trees.push(build_tree(data, &mut indices, 0, max_depth, &mut rng));
        }

        let mut forest = Self {
            trees,
            sample_size,
            offset: 0.0,
        };

        // Offset at the contamination quantile of the training scores makes
        // `decision < 0` flag roughly that share of the training set.
        let mut scores: Vec<f64> = data.iter().map(|row| forest.score_samples(row)).collect();
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        forest.offset = quantile(&scores, contamination);
        forest
    }

    /// Raw anomaly score in (0, 1]; higher is more anomalous.
    fn raw_score(&self, x: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let mean_path = self
            .trees
            .iter()
            .map(|tree| path_length(tree, x, 0.0))
            .sum::<f64>()
            / self.trees.len() as f64;
        2f64.powf(-mean_path / average_path_length(self.sample_size))
    }

    /// Negated raw score; always negative, lower is more anomalous.
    pub fn score_samples(&self, x: &[f64]) -> f64 {
        -self.raw_score(x)
    }

    /// Decision value: negative flags the point as an outlier.
    pub fn decision_function(&self, x: &[f64]) -> f64 {
        self.score_samples(x) - self.offset
    }

    pub fn predict_anomaly(&self, x: &[f64]) -> bool {
        self.decision_function(x) < 0.0
    }
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

#[cfg(test)]
#[path = "forest_tests.rs"]
mod tests;
