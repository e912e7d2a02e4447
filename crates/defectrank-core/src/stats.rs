//! Streaming sufficient statistics.
//!
//! A [`BatchStats`] summarises a batch of samples as (count, mean, population
//! variance). Two summaries merge exactly into the summary of the union, so
//! models can learn from new submissions without keeping or re-scanning the
//! history. [`StatsVector`] applies the same merge element-wise to one summary
//! per defect.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Standard deviations below this are treated as zero spread.
const MIN_STD_DEV: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Scalar summaries
// ---------------------------------------------------------------------------

/// Count, mean and population (ddof 0) variance of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub count: u64,
    pub mean: f64,
    pub variance: f64,
}

impl BatchStats {
    /// Summary of no samples. Identity element of [`combine_stats`].
    pub const EMPTY: BatchStats = BatchStats {
        count: 0,
        mean: 0.0,
        variance: 0.0,
    };

    /// Summarise a batch in a single pass.
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::EMPTY;
        }
        Self {
            count: samples.len() as u64,
            mean: samples.iter().mean(),
            variance: samples.iter().population_variance(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.max(0.0).sqrt()
    }

    /// Standard score of `x` against this distribution; 0 when the
    /// distribution has no spread.
    pub fn z_score(&self, x: f64) -> f64 {
        let sd = self.std_dev();
        if sd < MIN_STD_DEV {
            0.0
        } else {
            (x - self.mean) / sd
        }
    }

    /// Merge with another batch summary.
    pub fn combine(&self, other: &BatchStats) -> BatchStats {
        combine_stats(self, other)
    }
}

/// Merge two batch summaries into the summary of their union.
///
/// `n = n₁+n₂`, `μ = (n₁μ₁+n₂μ₂)/n`,
/// `σ² = (n₁σ₁² + n₂σ₂² + n₁n₂/n·(μ₁−μ₂)²)/n`.
/// Merging two empty batches yields [`BatchStats::EMPTY`].
pub fn combine_stats(a: &BatchStats, b: &BatchStats) -> BatchStats {
    let count = a.count + b.count;
    if count == 0 {
        return BatchStats::EMPTY;
    }
    let (n1, n2, n) = (a.count as f64, b.count as f64, count as f64);
    let mean = (n1 * a.mean + n2 * b.mean) / n;
    let delta = a.mean - b.mean;
    let variance = (n1 * a.variance + n2 * b.variance + n1 * n2 / n * delta * delta) / n;
    BatchStats {
        count,
        mean,
        variance,
    }
}

// ---------------------------------------------------------------------------
// Element-wise summaries
// ---------------------------------------------------------------------------

/// One [`BatchStats`] per column (defect), merged element-wise.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsVector(Vec<BatchStats>);

impl StatsVector {
    /// `width` empty summaries.
    pub fn empty(width: usize) -> Self {
        Self(vec![BatchStats::EMPTY; width])
    }

    /// Column-wise summaries of `rows`; every row must have `width` entries.
    pub fn from_rows(rows: &[Vec<f64>], width: usize) -> Self {
        let stats = (0..width)
            .map(|col| {
                let column: Vec<f64> = rows.iter().map(|row| row[col]).collect();
                BatchStats::from_samples(&column)
            })
            .collect();
        Self(stats)
    }

    /// Merge `other` into `self`, column by column.
    pub fn combine(&mut self, other: &StatsVector) {
        debug_assert_eq!(self.0.len(), other.0.len());
        for (mine, theirs) in self.0.iter_mut().zip(&other.0) {
            *mine = combine_stats(mine, theirs);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, col: usize) -> BatchStats {
        self.0.get(col).copied().unwrap_or(BatchStats::EMPTY)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BatchStats> {
        self.0.iter()
    }

    pub fn means(&self) -> Vec<f64> {
        self.0.iter().map(|s| s.mean).collect()
    }

    pub fn std_devs(&self) -> Vec<f64> {
        self.0.iter().map(|s| s.std_dev()).collect()
    }

    /// Samples behind the summaries. All columns are fed the same rows, so
    /// the first column speaks for the whole vector.
    pub fn count(&self) -> u64 {
        self.0.first().map(|s| s.count).unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
