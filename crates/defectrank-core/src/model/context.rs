//! Models keyed by a submission's task or student.
//!
//! Both learn per-context defect *presence* statistics (a defect counts once
//! per submission, however often it occurs). [`FrequencyModel`] reads the
//! per-context means directly. [`CharacteristicModel`] also keeps global
//! presence statistics and reports how far a context's mean sits from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ContextStrategy, ModelKind, ModelState, WeightTable};
use crate::catalog::{DefectCatalog, DefectCounts, Observation, Submission};
use crate::stats::StatsVector;

/// Which submission field a model is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKey {
    Task,
    Student,
}

impl ContextKey {
    pub fn of(self, submission: &Submission) -> &str {
        match self {
            Self::Task => &submission.task,
            Self::Student => &submission.student,
        }
    }
}

/// Presence rows of `batch` grouped by context.
fn presence_by_context(
    catalog: &DefectCatalog,
    batch: &[Observation],
    key: ContextKey,
) -> BTreeMap<String, Vec<Vec<f64>>> {
    let mut grouped: BTreeMap<String, Vec<Vec<f64>>> = BTreeMap::new();
    for o in batch {
        grouped
            .entry(key.of(&o.submission).to_string())
            .or_default()
            .push(catalog.presence_vector(&o.counts));
    }
    grouped
}

fn merge_contexts(
    contexts: &mut BTreeMap<String, StatsVector>,
    grouped: &BTreeMap<String, Vec<Vec<f64>>>,
    width: usize,
) {
    for (context, rows) in grouped {
        contexts
            .entry(context.clone())
            .or_insert_with(|| StatsVector::empty(width))
            .combine(&StatsVector::from_rows(rows, width));
    }
}

// ---------------------------------------------------------------------------
// Frequency
// ---------------------------------------------------------------------------

/// Share of a context's submissions that exhibit each defect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyModel {
    key: ContextKey,
    width: usize,
    contexts: BTreeMap<String, StatsVector>,
}

impl FrequencyModel {
    pub fn new(key: ContextKey, catalog: &DefectCatalog) -> Self {
        Self {
            key,
            width: catalog.len(),
            contexts: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> ContextKey {
        self.key
    }

    /// Learned frequencies for one context, if it has been seen.
    pub fn frequencies(&self, context: &str) -> Option<Vec<f64>> {
        self.contexts.get(context).map(StatsVector::means)
    }
}

impl ContextStrategy for FrequencyModel {
    fn kind(&self) -> ModelKind {
        match self.key {
            ContextKey::Task => ModelKind::TaskCommon,
            ContextKey::Student => ModelKind::StudentFrequency,
        }
    }

    fn width(&self) -> usize {
        self.width
    }

    fn update(&mut self, catalog: &DefectCatalog, batch: &[Observation]) {
        let grouped = presence_by_context(catalog, batch, self.key);
        merge_contexts(&mut self.contexts, &grouped, self.width);
    }

    fn measure(&self, _: &DefectCatalog, submission: &Submission, _: &DefectCounts) -> Vec<f64> {
        self.frequencies(self.key.of(submission))
            .unwrap_or_else(|| vec![0.0; self.width])
    }

    fn observations(&self, submission: &Submission) -> u64 {
        self.contexts
            .get(self.key.of(submission))
            .map(StatsVector::count)
            .unwrap_or(0)
    }

    fn weights(&self, catalog: &DefectCatalog) -> WeightTable {
        let mut table = WeightTable::new(catalog);
        for (context, stats) in &self.contexts {
            table.insert(context.clone(), stats.means(), stats.count() as f64);
        }
        table
    }

    fn reset(&mut self) {
        self.contexts.clear();
    }

    fn state(&self) -> ModelState {
        match self.key {
            ContextKey::Task => ModelState::TaskCommon(self.clone()),
            ContextKey::Student => ModelState::StudentFrequency(self.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Characteristic
// ---------------------------------------------------------------------------

/// Z-score of a context's defect frequency against the presence distribution
/// over all submissions. The priority score is its magnitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacteristicModel {
    key: ContextKey,
    width: usize,
    contexts: BTreeMap<String, StatsVector>,
    global: StatsVector,
}

impl CharacteristicModel {
    pub fn new(key: ContextKey, catalog: &DefectCatalog) -> Self {
        Self {
            key,
            width: catalog.len(),
            contexts: BTreeMap::new(),
            global: StatsVector::empty(catalog.len()),
        }
    }

    pub fn key(&self) -> ContextKey {
        self.key
    }

    /// Presence statistics over every submission seen.
    pub fn global(&self) -> &StatsVector {
        &self.global
    }

    fn z_scores(&self, stats: &StatsVector) -> Vec<f64> {
        stats
            .iter()
            .zip(self.global.iter())
            .map(|(local, global)| global.z_score(local.mean))
            .collect()
    }
}

impl ContextStrategy for CharacteristicModel {
    fn kind(&self) -> ModelKind {
        match self.key {
            ContextKey::Task => ModelKind::TaskCharacteristic,
            ContextKey::Student => ModelKind::StudentCharacteristic,
        }
    }

    fn width(&self) -> usize {
        self.width
    }

    fn update(&mut self, catalog: &DefectCatalog, batch: &[Observation]) {
        let grouped = presence_by_context(catalog, batch, self.key);
        merge_contexts(&mut self.contexts, &grouped, self.width);
        let rows: Vec<Vec<f64>> = grouped.into_values().flatten().collect();
        self.global.combine(&StatsVector::from_rows(&rows, self.width));
    }

    fn measure(&self, _: &DefectCatalog, submission: &Submission, _: &DefectCounts) -> Vec<f64> {
        match self.contexts.get(self.key.of(submission)) {
            Some(stats) => self.z_scores(stats),
            None => vec![0.0; self.width],
        }
    }

    fn score(
        &self,
        catalog: &DefectCatalog,
        submission: &Submission,
        counts: &DefectCounts,
    ) -> Vec<f64> {
        self.measure(catalog, submission, counts)
            .into_iter()
            .map(f64::abs)
            .collect()
    }

    fn observations(&self, submission: &Submission) -> u64 {
        self.contexts
            .get(self.key.of(submission))
            .map(StatsVector::count)
            .unwrap_or(0)
    }

    fn weights(&self, catalog: &DefectCatalog) -> WeightTable {
        let mut table = WeightTable::new(catalog);
        for (context, stats) in &self.contexts {
            table.insert(context.clone(), self.z_scores(stats), stats.count() as f64);
        }
        table
    }

    fn reset(&mut self) {
        self.contexts.clear();
        self.global = StatsVector::empty(self.width);
    }

    fn state(&self) -> ModelState {
        match self.key {
            ContextKey::Task => ModelState::TaskCharacteristic(self.clone()),
            ContextKey::Student => ModelState::StudentCharacteristic(self.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{catalog, counts, obs, submission};

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_frequency_counts_presence_not_multiplicity() {
        let cat = catalog(&["D1", "D2"]);
        let mut model = FrequencyModel::new(ContextKey::Task, &cat);
        model.update(
            &cat,
            &[
                obs("s1", "alice", "t1", 0, &[("D1", 5)]),
                obs("s2", "bob", "t1", 1, &[("D2", 1)]),
                obs("s3", "carol", "t1", 2, &[("D1", 1)]),
                obs("s4", "dave", "t1", 3, &[]),
            ],
        );
        let freq = model.frequencies("t1").unwrap();
        assert_close(freq[0], 0.5);
        assert_close(freq[1], 0.25);
        assert_eq!(model.frequencies("t2"), None);
    }

    #[test]
    fn test_student_frequency_keys_by_student() {
        let cat = catalog(&["D1"]);
        let mut model = FrequencyModel::new(ContextKey::Student, &cat);
        model.update(
            &cat,
            &[
                obs("s1", "alice", "t1", 0, &[("D1", 1)]),
                obs("s2", "alice", "t2", 1, &[("D1", 1)]),
                obs("s3", "bob", "t1", 2, &[]),
            ],
        );
        let sub = submission("n", "alice", "t3", 9);
        assert_eq!(model.measure(&cat, &sub, &counts(&[])), vec![1.0]);
        assert_eq!(model.observations(&sub), 2);
        assert_eq!(model.kind(), ModelKind::StudentFrequency);
    }

    #[test]
    fn test_characteristic_z_against_global_presence() {
        let cat = catalog(&["D1"]);
        let mut model = CharacteristicModel::new(ContextKey::Task, &cat);
        // t1 always has D1, t2 never: global mean 0.5, std 0.5.
        model.update(
            &cat,
            &[
                obs("s1", "a", "t1", 0, &[("D1", 1)]),
                obs("s2", "b", "t1", 1, &[("D1", 1)]),
                obs("s3", "c", "t2", 2, &[]),
                obs("s4", "d", "t2", 3, &[]),
            ],
        );
        let t1 = submission("x", "e", "t1", 9);
        let t2 = submission("y", "e", "t2", 9);
        assert_close(model.measure(&cat, &t1, &counts(&[]))[0], 1.0);
        assert_close(model.measure(&cat, &t2, &counts(&[]))[0], -1.0);
        assert_close(model.score(&cat, &t2, &counts(&[]))[0], 1.0);
    }

    #[test]
    fn test_characteristic_zero_spread_gives_zero() {
        let cat = catalog(&["D1"]);
        let mut model = CharacteristicModel::new(ContextKey::Student, &cat);
        model.update(
            &cat,
            &[
                obs("s1", "alice", "t1", 0, &[("D1", 1)]),
                obs("s2", "bob", "t1", 1, &[("D1", 1)]),
            ],
        );
        let sub = submission("n", "alice", "t1", 9);
        assert_eq!(model.measure(&cat, &sub, &counts(&[("D1", 1)])), vec![0.0]);
    }

    #[test]
    fn test_characteristic_unknown_context_is_neutral() {
        let cat = catalog(&["D1", "D2"]);
        let model = CharacteristicModel::new(ContextKey::Task, &cat);
        let sub = submission("n", "alice", "t1", 0);
        assert_eq!(model.score(&cat, &sub, &counts(&[("D1", 1)])), vec![0.0, 0.0]);
        assert_eq!(model.observations(&sub), 0);
    }

    #[test]
    fn test_reset_clears_global_statistics() {
        let cat = catalog(&["D1"]);
        let mut model = CharacteristicModel::new(ContextKey::Task, &cat);
        model.update(&cat, &[obs("s1", "a", "t1", 0, &[("D1", 1)])]);
        assert_eq!(model.global().count(), 1);
        model.reset();
        assert_eq!(model, CharacteristicModel::new(ContextKey::Task, &cat));
    }
}
