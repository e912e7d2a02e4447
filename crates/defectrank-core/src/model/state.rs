//! Saving and restoring trained models as JSON.
//!
//! The saved document records the catalog columns it was trained against.
//! Loading into a catalog with different columns, or as the wrong model kind,
//! is rejected instead of silently misaligning scores.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{
    CharacteristicModel, ContextStrategy, DefectMultiplicityModel, EncounteredBeforeModel,
    FrequencyModel, ModelKind, ScoringModel, SeverityModel,
};
use crate::catalog::{DefectCatalog, DefectId, SubmissionId};
use crate::discretize::Discretizer;
use crate::error::{RankError, Result};

/// Version of the saved-model document this build writes and reads.
pub const STATE_VERSION: u32 = 1;

/// Learned state of one context strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "snake_case")]
pub enum ModelState {
    Severity(SeverityModel),
    TaskCommon(FrequencyModel),
    TaskCharacteristic(CharacteristicModel),
    StudentFrequency(FrequencyModel),
    StudentCharacteristic(CharacteristicModel),
    StudentEncounteredBefore(EncounteredBeforeModel),
    DefectMultiplicity(DefectMultiplicityModel),
}

impl ModelState {
    /// The kind named by the variant tag.
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::Severity(_) => ModelKind::Severity,
            Self::TaskCommon(_) => ModelKind::TaskCommon,
            Self::TaskCharacteristic(_) => ModelKind::TaskCharacteristic,
            Self::StudentFrequency(_) => ModelKind::StudentFrequency,
            Self::StudentCharacteristic(_) => ModelKind::StudentCharacteristic,
            Self::StudentEncounteredBefore(_) => ModelKind::StudentEncounteredBefore,
            Self::DefectMultiplicity(_) => ModelKind::DefectMultiplicity,
        }
    }

    /// Rebuild the strategy. A payload whose own key disagrees with the tag
    /// (e.g. a student-keyed table tagged `task_common`) is rejected.
    pub fn into_strategy(self) -> Result<Box<dyn ContextStrategy>> {
        let tagged = self.kind();
        let strategy: Box<dyn ContextStrategy> = match self {
            Self::Severity(m) => Box::new(m),
            Self::TaskCommon(m) | Self::StudentFrequency(m) => Box::new(m),
            Self::TaskCharacteristic(m) | Self::StudentCharacteristic(m) => Box::new(m),
            Self::StudentEncounteredBefore(m) => Box::new(m),
            Self::DefectMultiplicity(m) => Box::new(m),
        };
        if strategy.kind() != tagged {
            return Err(RankError::ModelKindMismatch {
                expected: tagged.to_string(),
                found: strategy.kind().to_string(),
            });
        }
        Ok(strategy)
    }
}

/// On-disk form of a [`ScoringModel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedModel {
    pub version: u32,
    pub kind: ModelKind,
    pub columns: Vec<DefectId>,
    pub min_observations: u64,
    pub discretizer: Discretizer,
    pub state: ModelState,
    /// Submissions already folded into `state`.
    #[serde(default)]
    pub learned: BTreeSet<SubmissionId>,
    pub created_by: String,
}

impl SavedModel {
    /// Check the document against a catalog and rebuild the model.
    pub fn into_model(self, catalog: Arc<DefectCatalog>) -> Result<ScoringModel> {
        if self.version != STATE_VERSION {
            return Err(RankError::UnsupportedStateVersion {
                found: self.version,
                supported: STATE_VERSION,
            });
        }
        check_columns(&self.columns, &catalog)?;
        if self.state.kind() != self.kind {
            return Err(RankError::ModelKindMismatch {
                expected: self.kind.to_string(),
                found: self.state.kind().to_string(),
            });
        }
        let strategy = self.state.into_strategy()?;
        if strategy.width() != catalog.len() {
            return Err(RankError::CatalogMismatch {
                reason: format!(
                    "state has {} columns, catalog has {}",
                    strategy.width(),
                    catalog.len()
                ),
            });
        }
        let mut model =
            ScoringModel::new(catalog, strategy, self.discretizer, self.min_observations);
        model.learned = self.learned;
        Ok(model)
    }
}

fn check_columns(columns: &[DefectId], catalog: &DefectCatalog) -> Result<()> {
    if columns.len() != catalog.len() {
        return Err(RankError::CatalogMismatch {
            reason: format!(
                "saved with {} defects, catalog has {}",
                columns.len(),
                catalog.len()
            ),
        });
    }
    for (i, (saved, current)) in columns.iter().zip(catalog.ids()).enumerate() {
        if saved != current {
            return Err(RankError::CatalogMismatch {
                reason: format!("column {i} is '{saved}' in the saved model but '{current}' in the catalog"),
            });
        }
    }
    Ok(())
}

impl ScoringModel {
    /// Snapshot of the full model state.
    pub fn to_saved(&self) -> SavedModel {
        SavedModel {
            version: STATE_VERSION,
            kind: self.kind(),
            columns: self.catalog.ids().map(str::to_string).collect(),
            min_observations: self.min_observations,
            discretizer: self.discretizer.clone(),
            state: self.strategy.state(),
            learned: self.learned.clone(),
            created_by: format!("defectrank {}", crate::VERSION),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_saved())?)
    }

    pub fn from_json(json: &str, catalog: Arc<DefectCatalog>) -> Result<Self> {
        let saved: SavedModel = serde_json::from_str(json)?;
        saved.into_model(catalog)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        log::info!("saved {} model to {}", self.kind(), path.display());
        Ok(())
    }

    /// Load a saved model of any kind.
    pub fn load(path: &Path, catalog: Arc<DefectCatalog>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let model = Self::from_json(&raw, catalog)?;
        log::info!("loaded {} model from {}", model.kind(), path.display());
        Ok(model)
    }

    /// Load a saved model, requiring it to be of `kind`.
    pub fn load_as(path: &Path, catalog: Arc<DefectCatalog>, kind: ModelKind) -> Result<Self> {
        let model = Self::load(path, catalog)?;
        if model.kind() != kind {
            return Err(RankError::ModelKindMismatch {
                expected: kind.to_string(),
                found: model.kind().to_string(),
            });
        }
        Ok(model)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
