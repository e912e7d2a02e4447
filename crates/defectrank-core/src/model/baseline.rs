//! Stateless severity baseline.

use serde::{Deserialize, Serialize};

use super::{ContextStrategy, ModelKind, ModelState, WeightTable};
use crate::catalog::{DefectCatalog, DefectCounts, Observation, Submission};

/// Scores every defect by its catalog severity, whatever the submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityModel {
    severities: Vec<f64>,
}

impl SeverityModel {
    pub fn new(catalog: &DefectCatalog) -> Self {
        Self {
            severities: catalog.defects().iter().map(|d| f64::from(d.severity)).collect(),
        }
    }
}

impl ContextStrategy for SeverityModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Severity
    }

    fn width(&self) -> usize {
        self.severities.len()
    }

    fn update(&mut self, _catalog: &DefectCatalog, _batch: &[Observation]) {}

    fn measure(&self, _: &DefectCatalog, _: &Submission, _: &DefectCounts) -> Vec<f64> {
        self.severities.clone()
    }

    /// Always enough: severity does not depend on data.
    fn observations(&self, _submission: &Submission) -> u64 {
        u64::MAX
    }

    fn weights(&self, catalog: &DefectCatalog) -> WeightTable {
        let mut table = WeightTable::new(catalog);
        table.insert("severity", self.severities.clone(), 1.0);
        table
    }

    fn reset(&mut self) {}

    fn state(&self) -> ModelState {
        ModelState::Severity(self.clone())
    }
}
