//! Data contracts consumed by the ranking engine.
//!
//! The catalogs (defects, tasks) are loaded once and never change. Submissions
//! and survey responses are append-only log entries. [`DefectCounts`] is what an
//! external linter reports for one submission.
//!
//! Every per-defect vector produced by this crate is aligned with the order of
//! the [`DefectCatalog`], so `values[catalog.position(id)]` is the value for
//! defect `id`.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RankError, Result};

pub type DefectId = String;
pub type TaskId = String;
pub type StudentId = String;
pub type SubmissionId = String;

// ---------------------------------------------------------------------------
// Catalog entries
// ---------------------------------------------------------------------------

/// A code-quality issue a linter can detect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Defect {
    pub id: DefectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Ordinal severity, 1 (least severe) to 5 (most severe).
    pub severity: u8,
    /// Defect family as labelled by the catalog authors (e.g. "style").
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Linter message codes that map onto this defect.
    #[serde(default)]
    pub detector_codes: Vec<String>,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub fix: Option<String>,
}

/// A programming exercise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub difficulty: Option<f64>,
}

/// One student's code for one task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    pub id: SubmissionId,
    pub student: StudentId,
    pub task: TaskId,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub correct: bool,
    pub timestamp: DateTime<Utc>,
}

/// Per-defect occurrence counts for one submission.
///
/// Defects that do not appear are simply absent from the map; a stored count
/// of zero is treated the same as absence.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct DefectCounts(BTreeMap<DefectId, u32>);

impl DefectCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, defect: impl Into<DefectId>, count: u32) {
        self.0.insert(defect.into(), count);
    }

    /// Occurrence count of `defect` (0 when absent).
    pub fn count(&self, defect: &str) -> u32 {
        self.0.get(defect).copied().unwrap_or(0)
    }

    pub fn is_present(&self, defect: &str) -> bool {
        self.count(defect) > 0
    }

    /// Ids of defects with a positive count, in id order.
    pub fn present(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(id, _)| id.as_str())
    }

    pub fn present_count(&self) -> usize {
        self.present().count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(id, count)| (id.as_str(), *count))
    }

    /// Check that every defect mentioned is part of `catalog`.
    pub fn validate(&self, catalog: &DefectCatalog) -> Result<()> {
        for id in self.0.keys() {
            if catalog.position(id).is_none() {
                return Err(RankError::UnknownDefect { id: id.clone() });
            }
        }
        Ok(())
    }
}

impl<K: Into<DefectId>> FromIterator<(K, u32)> for DefectCounts {
    fn from_iter<I: IntoIterator<Item = (K, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// A submission paired with its linter output. Unit of model training.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub submission: Submission,
    pub counts: DefectCounts,
}

impl Observation {
    pub fn new(submission: Submission, counts: DefectCounts) -> Self {
        Self { submission, counts }
    }
}

/// One survey answer: which defect a respondent would explain first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseRecord {
    pub submission: SubmissionId,
    pub respondent: String,
    /// The chosen defect.
    pub answer: DefectId,
    #[serde(default)]
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Defect catalog
// ---------------------------------------------------------------------------

/// The immutable list of known defects. Fixes the column order of every
/// per-defect vector and weight table.
#[derive(Debug, Clone, PartialEq)]
pub struct DefectCatalog {
    defects: Vec<Defect>,
    index: HashMap<DefectId, usize>,
}

impl DefectCatalog {
    /// Build a catalog, rejecting duplicate ids.
    pub fn new(defects: Vec<Defect>) -> Result<Self> {
        let mut index = HashMap::with_capacity(defects.len());
        for (pos, defect) in defects.iter().enumerate() {
            if index.insert(defect.id.clone(), pos).is_some() {
                return Err(RankError::DuplicateDefect {
                    id: defect.id.clone(),
                });
            }
        }
        Ok(Self { defects, index })
    }

    pub fn len(&self) -> usize {
        self.defects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defects.is_empty()
    }

    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    pub fn get(&self, id: &str) -> Option<&Defect> {
        self.position(id).map(|pos| &self.defects[pos])
    }

    /// Column index of `id`.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.defects.iter().map(|d| d.id.as_str())
    }

    /// Presence mask (count > 0) aligned with the catalog.
    pub fn presence(&self, counts: &DefectCounts) -> Vec<bool> {
        self.defects
            .iter()
            .map(|d| counts.is_present(&d.id))
            .collect()
    }

    /// Presence indicators as 0.0/1.0, aligned with the catalog.
    pub fn presence_vector(&self, counts: &DefectCounts) -> Vec<f64> {
        self.presence(counts)
            .into_iter()
            .map(|p| if p { 1.0 } else { 0.0 })
            .collect()
    }

    /// Raw occurrence counts, aligned with the catalog.
    pub fn count_vector(&self, counts: &DefectCounts) -> Vec<f64> {
        self.defects
            .iter()
            .map(|d| counts.count(&d.id) as f64)
            .collect()
    }

    /// Pair each catalog defect id with the value at the same position.
    pub fn label(&self, values: &[f64]) -> BTreeMap<DefectId, f64> {
        self.defects
            .iter()
            .zip(values)
            .map(|(d, v)| (d.id.clone(), *v))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
