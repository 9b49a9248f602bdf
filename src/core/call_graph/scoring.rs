// src/core/call_graph/scoring.rs
//! Weighted feature tables shared by the heuristic detectors.

use serde::{Deserialize, Serialize};

/// Scores are compared against thresholds with this tolerance
pub const SCORE_EPSILON: f64 = 1e-9;

/// One row of a feature table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureContribution<F> {
    pub feature: F,
    pub weight: f64,
    /// Normalized signal in [0, 1]; 0 when the feature is absent
    pub signal: f64,
    pub contribution: f64,
}

/// Weighted sum of independent features
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable<F> {
    rows: Vec<FeatureContribution<F>>,
}

impl<F> FeatureTable<F> {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Add a feature; signals outside [0, 1] or NaN are clamped
    pub fn add(&mut self, feature: F, weight: f64, signal: f64) -> &mut Self {
        let signal = if signal.is_nan() { 0.0 } else { signal.clamp(0.0, 1.0) };
        self.rows.push(FeatureContribution {
            feature,
            weight,
            signal,
            contribution: round_score(weight * signal),
        });
        self
    }

    pub fn flag(&mut self, feature: F, weight: f64, present: bool) -> &mut Self {
        self.add(feature, weight, if present { 1.0 } else { 0.0 })
    }

    /// Sum of contributions, clamped to [0, 1]
    pub fn score(&self) -> f64 {
        round_score(self.rows.iter().map(|row| row.contribution).sum::<f64>()).clamp(0.0, 1.0)
    }

    pub fn rows(&self) -> &[FeatureContribution<F>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<FeatureContribution<F>> {
        self.rows
    }
}

impl<F> Default for FeatureTable<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Round to six decimals so sums like 0.4 + 0.3 compare exactly
pub fn round_score(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

pub fn exceeds(score: f64, threshold: f64) -> bool {
    score > threshold + SCORE_EPSILON
}
