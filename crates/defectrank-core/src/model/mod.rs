//! Scoring models.
//!
//! A [`ScoringModel`] is composed of two orthogonal parts:
//!
//! - a [`ContextStrategy`] that owns the learned table (keyed by nothing, by
//!   task, or by student) and turns it into per-defect values, and
//! - a [`Discretizer`] that maps those values onto a small ordinal scale.
//!
//! The model itself adds what every variant shares: catalog validation,
//! masking of absent defects, the softmax priority distribution, threshold
//! refits after each update, and JSON save/load of the whole state.
//!
//! ```
//! use std::sync::Arc;
//! use defectrank_core::{DefectCatalog, ModelKind, RankerConfig, ScoringModel};
//!
//! let catalog = Arc::new(DefectCatalog::new(vec![]).unwrap());
//! let model = ScoringModel::build(ModelKind::TaskCommon, catalog, &RankerConfig::default());
//! assert_eq!(model.kind(), ModelKind::TaskCommon);
//! ```

pub mod baseline;
pub mod context;
pub mod state;
pub mod student;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{
    DefectCatalog, DefectCounts, DefectId, Observation, Submission, SubmissionId,
};
use crate::config::RankerConfig;
use crate::discretize::{Discretizer, Scale};
use crate::error::{RankError, Result};
use crate::prioritize::softmax_present;

pub use baseline::SeverityModel;
pub use context::{CharacteristicModel, ContextKey, FrequencyModel};
pub use state::{ModelState, STATE_VERSION, SavedModel};
pub use student::{DefectMultiplicityModel, EncounteredBeforeModel};

/// Severity cut points: level equals the catalog severity.
const SEVERITY_CUTOFFS: [f64; 4] = [1.5, 2.5, 3.5, 4.5];

/// Recency cut points on `1/(submissions since last seen)`:
/// never, over 10, 5–10, 2–5, 1–2 submissions ago.
const RECENCY_CUTOFFS: [f64; 4] = [0.001, 0.1, 0.2, 0.5];

// ---------------------------------------------------------------------------
// Model identity
// ---------------------------------------------------------------------------

/// What a model conditions its scores on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    /// Same scores for every submission.
    Stateless,
    /// Keyed by task.
    Task,
    /// Keyed by student (or global statistics over students).
    Student,
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stateless => write!(f, "stateless"),
            Self::Task => write!(f, "task"),
            Self::Student => write!(f, "student"),
        }
    }
}

/// Every model variant this crate knows how to build and load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Severity,
    TaskCommon,
    TaskCharacteristic,
    StudentFrequency,
    StudentCharacteristic,
    StudentEncounteredBefore,
    DefectMultiplicity,
}

/// Human-facing metadata about a model kind.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Command-line name (e.g. `"task-common"`).
    pub name: &'static str,
    /// What the model prioritizes.
    pub description: &'static str,
    /// Precise name of the measured quantity.
    pub measure: &'static str,
    /// Short label for the measured quantity.
    pub measure_description: &'static str,
    pub context: ContextType,
    pub scale: Scale,
}

impl ModelKind {
    pub const ALL: [ModelKind; 7] = [
        Self::Severity,
        Self::TaskCommon,
        Self::TaskCharacteristic,
        Self::StudentFrequency,
        Self::StudentCharacteristic,
        Self::StudentEncounteredBefore,
        Self::DefectMultiplicity,
    ];

    pub fn info(self) -> ModelInfo {
        match self {
            Self::Severity => ModelInfo {
                name: "severity",
                description: "Prioritizes defects based on their inherent severity (a fixed, global value).",
                measure: "Severity (1 = Least Severe, 5 = Most Severe)",
                measure_description: "Fixed Severity",
                context: ContextType::Stateless,
                scale: Scale::Frequency,
            },
            Self::TaskCommon => ModelInfo {
                name: "task-common",
                description: "Prioritizes defects based on their average frequency in a task.",
                measure: "Relative Frequency",
                measure_description: "Task-Defect Commonality",
                context: ContextType::Task,
                scale: Scale::Frequency,
            },
            Self::TaskCharacteristic => ModelInfo {
                name: "task-characteristic",
                description: "Prioritizes defects that are unusually common in a task compared to all submissions.",
                measure: "Z-Score",
                measure_description: "Characteristic Task-Defect Scores",
                context: ContextType::Task,
                scale: Scale::ZScore,
            },
            Self::StudentFrequency => ModelInfo {
                name: "student-frequency",
                description: "Prioritizes defects based on a student's past frequency of making them.",
                measure: "Relative Frequency",
                measure_description: "Student-Specific Frequencies",
                context: ContextType::Student,
                scale: Scale::Frequency,
            },
            Self::StudentCharacteristic => ModelInfo {
                name: "student-characteristic",
                description: "Prioritizes defects a student makes noticeably more often than everyone else.",
                measure: "Z-Score",
                measure_description: "Student-Defect Characteristic Scores",
                context: ContextType::Student,
                scale: Scale::ZScore,
            },
            Self::StudentEncounteredBefore => ModelInfo {
                name: "student-encountered-before",
                description: "Prioritizes defects that a student has encountered recently.",
                measure: "Submissions since last encounter (inverted)",
                measure_description: "Student-Defect Recency",
                context: ContextType::Student,
                scale: Scale::Frequency,
            },
            Self::DefectMultiplicity => ModelInfo {
                name: "defect-multiplicity",
                description: "Prioritizes defects by how unusually often they occur in a submission, with adaptive global statistics.",
                measure: "Normalized Defect Counts",
                measure_description: "Defect Multiplicity",
                context: ContextType::Student,
                scale: Scale::ZScore,
            },
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info().name)
    }
}

impl FromStr for ModelKind {
    type Err = RankError;

    /// Accepts the command-line name or its snake_case form.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.info().name == wanted)
            .ok_or_else(|| RankError::UnknownModelKind(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Weight tables
// ---------------------------------------------------------------------------

/// A model's learned values: one row per context key, one column per defect.
///
/// `traffic` holds the number of observations behind each row; it weights the
/// cells when thresholds are fitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightTable {
    pub columns: Vec<DefectId>,
    pub rows: BTreeMap<String, Vec<f64>>,
    pub traffic: BTreeMap<String, f64>,
}

impl WeightTable {
    pub fn new(catalog: &DefectCatalog) -> Self {
        Self {
            columns: catalog.ids().map(str::to_string).collect(),
            rows: BTreeMap::new(),
            traffic: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, values: Vec<f64>, traffic: f64) {
        let key = key.into();
        self.traffic.insert(key.clone(), traffic);
        self.rows.insert(key, values);
    }

    pub fn row(&self, key: &str) -> Option<&[f64]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Flattened `(values, traffic)` cells, row-major in key order.
    pub fn cells(&self) -> (Vec<f64>, Vec<f64>) {
        let mut values = Vec::new();
        let mut traffic = Vec::new();
        for (key, row) in &self.rows {
            let weight = self.traffic.get(key).copied().unwrap_or(0.0);
            values.extend_from_slice(row);
            traffic.extend(std::iter::repeat_n(weight, row.len()));
        }
        (values, traffic)
    }
}

// ---------------------------------------------------------------------------
// Context strategy
// ---------------------------------------------------------------------------

/// The learned, context-keyed part of a model.
///
/// Implementations never fail on unseen contexts: `measure` returns zeros and
/// `observations` returns 0 for a task or student they have not learned about.
pub trait ContextStrategy: fmt::Debug + Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Number of catalog columns this strategy was built for.
    fn width(&self) -> usize;

    /// Fold a batch of observations into the learned state. The batch has
    /// already been validated against the catalog.
    fn update(&mut self, catalog: &DefectCatalog, batch: &[Observation]);

    /// Signed per-defect value for the submission's context, aligned with the
    /// catalog. This is the value that gets discretized.
    fn measure(
        &self,
        catalog: &DefectCatalog,
        submission: &Submission,
        counts: &DefectCounts,
    ) -> Vec<f64>;

    /// Per-defect priority score. Defaults to the measure; deviation-style
    /// models return its magnitude.
    fn score(
        &self,
        catalog: &DefectCatalog,
        submission: &Submission,
        counts: &DefectCounts,
    ) -> Vec<f64> {
        self.measure(catalog, submission, counts)
    }

    /// How many observations back the context of `submission`.
    fn observations(&self, submission: &Submission) -> u64;

    fn weights(&self, catalog: &DefectCatalog) -> WeightTable;

    /// Forget everything learned.
    fn reset(&mut self);

    /// Serializable snapshot of the learned state.
    fn state(&self) -> ModelState;
}

// ---------------------------------------------------------------------------
// Scoring model
// ---------------------------------------------------------------------------

/// A context strategy and a discretizer over one shared defect catalog.
#[derive(Debug)]
pub struct ScoringModel {
    catalog: Arc<DefectCatalog>,
    strategy: Box<dyn ContextStrategy>,
    discretizer: Discretizer,
    min_observations: u64,
    learned: BTreeSet<SubmissionId>,
}

impl ScoringModel {
    /// Compose a model from explicit parts.
    pub fn new(
        catalog: Arc<DefectCatalog>,
        strategy: Box<dyn ContextStrategy>,
        discretizer: Discretizer,
        min_observations: u64,
    ) -> Self {
        Self {
            catalog,
            strategy,
            discretizer,
            min_observations,
            learned: BTreeSet::new(),
        }
    }

    /// Build a fresh model of `kind` with its standard discretization policy.
    pub fn build(kind: ModelKind, catalog: Arc<DefectCatalog>, config: &RankerConfig) -> Self {
        let strategy: Box<dyn ContextStrategy> = match kind {
            ModelKind::Severity => Box::new(SeverityModel::new(&catalog)),
            ModelKind::TaskCommon => Box::new(FrequencyModel::new(ContextKey::Task, &catalog)),
            ModelKind::StudentFrequency => {
                Box::new(FrequencyModel::new(ContextKey::Student, &catalog))
            }
            ModelKind::TaskCharacteristic => {
                Box::new(CharacteristicModel::new(ContextKey::Task, &catalog))
            }
            ModelKind::StudentCharacteristic => {
                Box::new(CharacteristicModel::new(ContextKey::Student, &catalog))
            }
            ModelKind::StudentEncounteredBefore => Box::new(EncounteredBeforeModel::new(&catalog)),
            ModelKind::DefectMultiplicity => Box::new(DefectMultiplicityModel::new(&catalog)),
        };
        let discretizer = default_discretizer(kind, config);
        Self::new(catalog, strategy, discretizer, config.min_observations)
    }

    pub fn kind(&self) -> ModelKind {
        self.strategy.kind()
    }

    pub fn info(&self) -> ModelInfo {
        self.kind().info()
    }

    pub fn catalog(&self) -> &Arc<DefectCatalog> {
        &self.catalog
    }

    pub fn discretizer(&self) -> &Discretizer {
        &self.discretizer
    }

    pub fn thresholds(&self) -> &[f64] {
        self.discretizer.thresholds()
    }

    /// Learn from a batch. The whole batch is validated first, so a rejected
    /// batch leaves the model untouched.
    pub fn update(&mut self, batch: &[Observation]) -> Result<()> {
        for observation in batch {
            observation.counts.validate(&self.catalog)?;
        }
        if batch.is_empty() {
            return Ok(());
        }
        self.strategy.update(&self.catalog, batch);
        self.learned.extend(batch.iter().map(|o| o.submission.id.clone()));
        let (values, traffic) = self.strategy.weights(&self.catalog).cells();
        self.discretizer.fit(&values, &traffic);
        log::debug!("{} model learned from {} submissions", self.kind(), batch.len());
        Ok(())
    }

    /// Ids of every submission this model has learned from.
    pub fn learned(&self) -> &BTreeSet<SubmissionId> {
        &self.learned
    }

    /// The observations of `batch` not yet learned from, first occurrence of
    /// each submission id only. Feeding a replayed log through this before
    /// [`update`](Self::update) keeps each submission counted once.
    pub fn unlearned(&self, batch: &[Observation]) -> Vec<Observation> {
        let mut seen = BTreeSet::new();
        batch
            .iter()
            .filter(|o| !self.learned.contains(&o.submission.id))
            .filter(|o| seen.insert(o.submission.id.clone()))
            .cloned()
            .collect()
    }

    /// Learn from a single submission.
    pub fn update_one(&mut self, observation: &Observation) -> Result<()> {
        self.update(std::slice::from_ref(observation))
    }

    /// Scores over the full catalog. Only entries of present defects are
    /// meaningful; an unseen context scores all zeros.
    pub fn score(&self, submission: &Submission, counts: &DefectCounts) -> Vec<f64> {
        self.warn_unknown(counts);
        self.strategy.score(&self.catalog, submission, counts)
    }

    /// Softmax of the scores over present defects; absent defects get 0.
    pub fn prioritize(&self, submission: &Submission, counts: &DefectCounts) -> Vec<f64> {
        let scores = self.score(submission, counts);
        softmax_present(&scores, &self.catalog.presence(counts))
    }

    /// Discrete level per catalog defect. Absent defects, and every defect
    /// when the context has fewer than the minimum observations, get `None`.
    pub fn discretize(&self, submission: &Submission, counts: &DefectCounts) -> Vec<Option<i32>> {
        self.warn_unknown(counts);
        let present = self.catalog.presence(counts);
        if self.strategy.observations(submission) < self.min_observations {
            return vec![None; present.len()];
        }
        self.strategy
            .measure(&self.catalog, submission, counts)
            .into_iter()
            .zip(present)
            .map(|(value, p)| if p { self.discretizer.level(value) } else { None })
            .collect()
    }

    /// Back to the state of a freshly built model.
    pub fn reset(&mut self) {
        self.strategy.reset();
        self.discretizer.reset();
        self.learned.clear();
    }

    /// The learned weight table, for inspection.
    pub fn weights(&self) -> WeightTable {
        self.strategy.weights(&self.catalog)
    }

    fn warn_unknown(&self, counts: &DefectCounts) {
        if let Err(e) = counts.validate(&self.catalog) {
            log::warn!("{e}; ignored while scoring");
        }
    }
}

/// Standard threshold policy for each model kind.
pub fn default_discretizer(kind: ModelKind, config: &RankerConfig) -> Discretizer {
    let scale = kind.info().scale;
    match kind {
        ModelKind::Severity => Discretizer::fixed(scale, SEVERITY_CUTOFFS.to_vec()),
        ModelKind::StudentEncounteredBefore => {
            Discretizer::fixed(scale, RECENCY_CUTOFFS.to_vec())
        }
        ModelKind::DefectMultiplicity => {
            Discretizer::fixed(scale, config.z_score_cutoffs.clone())
        }
        ModelKind::TaskCommon
        | ModelKind::StudentFrequency
        | ModelKind::TaskCharacteristic
        | ModelKind::StudentCharacteristic => Discretizer::traffic_weighted(scale, config),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
