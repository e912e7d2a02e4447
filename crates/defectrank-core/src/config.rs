//! Tunable constants for discretization, explanations and the survey.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Quantile positions of the four cut points between the five levels.
pub const PERCENTILES: [f64; 4] = [0.15, 0.30, 0.70, 0.85];

/// (score, traffic) pairs with traffic at or below this are ignored when
/// fitting thresholds.
pub const MIN_HURDLE: f64 = 1e-3;

/// Cut points for statistics that are true per-observation z-scores.
pub const Z_SCORE_CUTOFFS: [f64; 4] = [-1.5, -0.5, 0.5, 1.5];

/// Configuration shared by model construction, ranking and question selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    /// Quantiles used for traffic-weighted thresholds.
    pub percentiles: Vec<f64>,
    /// Minimum traffic for a cell to count towards thresholds.
    pub min_hurdle: f64,
    /// Fixed cutoffs for genuine z-score statistics.
    pub z_score_cutoffs: Vec<f64>,
    /// Contexts observed fewer times than this get no discrete level.
    pub min_observations: u64,
    /// Show the feedback prompt every N answered survey questions.
    pub feedback_frequency: usize,
    /// Maximum sentences per defect in ranking explanations.
    pub max_explanation_length: usize,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            percentiles: PERCENTILES.to_vec(),
            min_hurdle: MIN_HURDLE,
            z_score_cutoffs: Z_SCORE_CUTOFFS.to_vec(),
            min_observations: 2,
            feedback_frequency: 10,
            max_explanation_length: 3,
        }
    }
}

/// Load a [`RankerConfig`] from a JSON file. Missing keys keep their defaults.
pub fn load_config_from_path(path: &Path) -> Result<RankerConfig> {
    let raw = std::fs::read_to_string(path)?;
    let config = serde_json::from_str::<RankerConfig>(&raw)?;
    log::info!("loaded ranker config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_matches_constants() {
        let cfg = RankerConfig::default();
        assert_eq!(cfg.percentiles, PERCENTILES.to_vec());
        assert_eq!(cfg.z_score_cutoffs, Z_SCORE_CUTOFFS.to_vec());
        assert_eq!(cfg.min_observations, 2);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"feedback_frequency": 5, "min_hurdle": 0.5}}"#).unwrap();
        let cfg = load_config_from_path(file.path()).unwrap();
        assert_eq!(cfg.feedback_frequency, 5);
        assert_eq!(cfg.min_hurdle, 0.5);
        assert_eq!(cfg.percentiles, PERCENTILES.to_vec());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(load_config_from_path(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config_from_path(&dir.path().join("absent.json")).is_err());
    }
}
