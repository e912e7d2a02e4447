//! Turning continuous scores into small ordinal scales.
//!
//! Two scales exist: a 1–5 frequency scale and a −2..+2 z-score scale. Cut
//! points either come from the model's own weight table through
//! traffic-weighted quantiles, or are fixed when the statistic has a known
//! theoretical distribution. One model instance uses exactly one policy.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::RankerConfig;

// ---------------------------------------------------------------------------
// Scales
// ---------------------------------------------------------------------------

/// Ordinal output scale of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    /// Levels 1 (very low) to 5 (very high).
    Frequency,
    /// Levels −2 (much lower than others) to +2 (much higher than others).
    ZScore,
}

impl Scale {
    /// Added to the bin index to obtain the level.
    pub fn offset(self) -> i32 {
        match self {
            Self::Frequency => 1,
            Self::ZScore => -2,
        }
    }

    /// Short scale name as shown to survey respondents.
    pub fn name(self) -> &'static str {
        match self {
            Self::Frequency => "1-5",
            Self::ZScore => "-2-2",
        }
    }

    /// Human wording for a level on this scale.
    pub fn label(self, level: i32) -> Option<&'static str> {
        match (self, level) {
            (Self::Frequency, 1) => Some("very low"),
            (Self::Frequency, 2) => Some("low"),
            (Self::Frequency, 3) => Some("medium"),
            (Self::Frequency, 4) => Some("high"),
            (Self::Frequency, 5) => Some("very high"),
            (Self::ZScore, -2) => Some("much lower than others"),
            (Self::ZScore, -1) => Some("lower than others"),
            (Self::ZScore, 0) => Some("average"),
            (Self::ZScore, 1) => Some("higher than others"),
            (Self::ZScore, 2) => Some("much higher than others"),
            _ => None,
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// Threshold math
// ---------------------------------------------------------------------------

/// Weighted quantiles of `values`.
///
/// Values are sorted, each is placed at its cumulative weight minus half its
/// own weight, positions are normalised by the total weight, and each
/// requested quantile is linearly interpolated between neighbours (clamped at
/// both ends). `values` and `weights` must have equal, non-zero length.
pub fn weighted_quantile(values: &[f64], quantiles: &[f64], weights: &[f64]) -> Vec<f64> {
    debug_assert_eq!(values.len(), weights.len());
    if values.is_empty() {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let sorted_values: Vec<f64> = order.iter().map(|&i| values[i]).collect();
    let sorted_weights: Vec<f64> = order.iter().map(|&i| weights[i]).collect();

    let total: f64 = sorted_weights.iter().sum();
    let mut running = 0.0;
    let positions: Vec<f64> = sorted_weights
        .iter()
        .map(|&w| {
            running += w;
            (running - 0.5 * w) / total
        })
        .collect();

    quantiles
        .iter()
        .map(|&q| interpolate(q, &positions, &sorted_values))
        .collect()
}

/// Piecewise-linear interpolation of `(xp, fp)` at `x`; `xp` ascending.
fn interpolate(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let last = xp.len() - 1;
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[last] {
        return fp[last];
    }
    let j = xp.partition_point(|&p| p <= x);
    let (x0, x1) = (xp[j - 1], xp[j]);
    let (y0, y1) = (fp[j - 1], fp[j]);
    if x1 - x0 <= 0.0 {
        y1
    } else {
        y0 + (x - x0) * (y1 - y0) / (x1 - x0)
    }
}

/// Bin index of `x`: the number of thresholds `<= x`, in `[0, thresholds.len()]`.
pub fn digitize(x: f64, thresholds: &[f64]) -> usize {
    thresholds.partition_point(|&t| t <= x)
}

// ---------------------------------------------------------------------------
// Discretizer
// ---------------------------------------------------------------------------

/// Where the cut points come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Quantiles of the model's weights, weighted by observation counts.
    TrafficWeighted {
        percentiles: Vec<f64>,
        min_hurdle: f64,
    },
    /// Theoretical cut points that never change.
    Fixed(Vec<f64>),
}

/// Maps a score to a level on one [`Scale`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discretizer {
    scale: Scale,
    policy: ThresholdPolicy,
    thresholds: Vec<f64>,
}

impl Discretizer {
    /// Thresholds learned from model weights; undefined until [`fit`](Self::fit).
    pub fn traffic_weighted(scale: Scale, config: &RankerConfig) -> Self {
        Self {
            scale,
            policy: ThresholdPolicy::TrafficWeighted {
                percentiles: config.percentiles.clone(),
                min_hurdle: config.min_hurdle,
            },
            thresholds: Vec::new(),
        }
    }

    /// Constant thresholds.
    pub fn fixed(scale: Scale, mut cutoffs: Vec<f64>) -> Self {
        cutoffs.sort_by(f64::total_cmp);
        Self {
            scale,
            policy: ThresholdPolicy::Fixed(cutoffs.clone()),
            thresholds: cutoffs,
        }
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    /// Recompute traffic-weighted thresholds from `(value, traffic)` pairs.
    /// Pairs with traffic at or below the hurdle, or non-finite values, are
    /// dropped. Fixed policies ignore this call.
    pub fn fit(&mut self, values: &[f64], traffic: &[f64]) {
        let ThresholdPolicy::TrafficWeighted {
            percentiles,
            min_hurdle,
        } = &self.policy
        else {
            return;
        };

        let (kept_values, kept_weights): (Vec<f64>, Vec<f64>) = values
            .iter()
            .zip(traffic)
            .filter(|(v, w)| v.is_finite() && **w > *min_hurdle)
            .map(|(v, w)| (*v, *w))
            .unzip();

        self.thresholds = weighted_quantile(&kept_values, percentiles, &kept_weights);
        log::debug!(
            "refit {} thresholds from {} weighted cells: {:?}",
            self.scale,
            kept_values.len(),
            self.thresholds
        );
    }

    /// Drop learned thresholds. Fixed policies keep theirs.
    pub fn reset(&mut self) {
        if let ThresholdPolicy::TrafficWeighted { .. } = self.policy {
            self.thresholds.clear();
        }
    }

    /// Level of `score`, or `None` while no thresholds exist.
    pub fn level(&self, score: f64) -> Option<i32> {
        if self.thresholds.is_empty() {
            return None;
        }
        Some(digitize(score, &self.thresholds) as i32 + self.scale.offset())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
