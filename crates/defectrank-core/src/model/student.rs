//! Student-history models that are not plain frequencies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ContextStrategy, ModelKind, ModelState, WeightTable};
use crate::catalog::{DefectCatalog, DefectCounts, Observation, StudentId, Submission};
use crate::stats::StatsVector;

// ---------------------------------------------------------------------------
// Recency
// ---------------------------------------------------------------------------

/// One student's history: submissions seen, and for each defect how many
/// submissions ago it last appeared (`None` if never).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecencyRow {
    pub submissions: u64,
    pub since_last: Vec<Option<u64>>,
}

impl RecencyRow {
    fn new(width: usize) -> Self {
        Self {
            submissions: 0,
            since_last: vec![None; width],
        }
    }

    /// `1/(c+1)` for a defect last seen `c+1` submissions ago, 0 if never.
    pub fn scores(&self) -> Vec<f64> {
        self.since_last
            .iter()
            .map(|c| match c {
                Some(c) => 1.0 / (*c as f64 + 1.0),
                None => 0.0,
            })
            .collect()
    }
}

/// Scores defects by how recently the student last made them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounteredBeforeModel {
    width: usize,
    students: BTreeMap<StudentId, RecencyRow>,
}

impl EncounteredBeforeModel {
    pub fn new(catalog: &DefectCatalog) -> Self {
        Self {
            width: catalog.len(),
            students: BTreeMap::new(),
        }
    }

    pub fn history(&self, student: &str) -> Option<&RecencyRow> {
        self.students.get(student)
    }
}

impl ContextStrategy for EncounteredBeforeModel {
    fn kind(&self) -> ModelKind {
        ModelKind::StudentEncounteredBefore
    }

    fn width(&self) -> usize {
        self.width
    }

    /// Submissions are replayed in timestamp order; equal timestamps keep
    /// batch order.
    fn update(&mut self, catalog: &DefectCatalog, batch: &[Observation]) {
        let mut ordered: Vec<&Observation> = batch.iter().collect();
        ordered.sort_by_key(|o| o.submission.timestamp);

        for o in ordered {
            let width = self.width;
            let row = self
                .students
                .entry(o.submission.student.clone())
                .or_insert_with(|| RecencyRow::new(width));
            row.submissions += 1;
            for (counter, present) in row.since_last.iter_mut().zip(catalog.presence(&o.counts)) {
                *counter = if present {
                    Some(0)
                } else {
                    counter.map(|c| c + 1)
                };
            }
        }
    }

    fn measure(&self, _: &DefectCatalog, submission: &Submission, _: &DefectCounts) -> Vec<f64> {
        self.students
            .get(&submission.student)
            .map(RecencyRow::scores)
            .unwrap_or_else(|| vec![0.0; self.width])
    }

    fn observations(&self, submission: &Submission) -> u64 {
        self.students
            .get(&submission.student)
            .map(|row| row.submissions)
            .unwrap_or(0)
    }

    fn weights(&self, catalog: &DefectCatalog) -> WeightTable {
        let mut table = WeightTable::new(catalog);
        for (student, row) in &self.students {
            table.insert(student.clone(), row.scores(), row.submissions as f64);
        }
        table
    }

    fn reset(&mut self) {
        self.students.clear();
    }

    fn state(&self) -> ModelState {
        ModelState::StudentEncounteredBefore(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Multiplicity
// ---------------------------------------------------------------------------

/// Z-score of a defect's count in this submission against its count
/// distribution over all submissions (zeros included).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectMultiplicityModel {
    width: usize,
    global: StatsVector,
}

impl DefectMultiplicityModel {
    pub fn new(catalog: &DefectCatalog) -> Self {
        Self {
            width: catalog.len(),
            global: StatsVector::empty(catalog.len()),
        }
    }

    pub fn global(&self) -> &StatsVector {
        &self.global
    }
}

impl ContextStrategy for DefectMultiplicityModel {
    fn kind(&self) -> ModelKind {
        ModelKind::DefectMultiplicity
    }

    fn width(&self) -> usize {
        self.width
    }

    fn update(&mut self, catalog: &DefectCatalog, batch: &[Observation]) {
        let rows: Vec<Vec<f64>> = batch.iter().map(|o| catalog.count_vector(&o.counts)).collect();
        self.global.combine(&StatsVector::from_rows(&rows, self.width));
    }

    fn measure(
        &self,
        catalog: &DefectCatalog,
        _: &Submission,
        counts: &DefectCounts,
    ) -> Vec<f64> {
        catalog
            .count_vector(counts)
            .into_iter()
            .zip(self.global.iter())
            .map(|(count, stats)| stats.z_score(count))
            .collect()
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

    /// Global: every submission contributes, whoever wrote it.
    fn observations(&self, _submission: &Submission) -> u64 {
        self.global.count()
    }

    fn weights(&self, catalog: &DefectCatalog) -> WeightTable {
        let mut table = WeightTable::new(catalog);
        if self.global.count() > 0 {
            let traffic = self.global.count() as f64;
            table.insert("mean", self.global.means(), traffic);
            table.insert("std", self.global.std_devs(), traffic);
        }
        table
    }

    fn reset(&mut self) {
        self.global = StatsVector::empty(self.width);
    }

    fn state(&self) -> ModelState {
        ModelState::DefectMultiplicity(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{catalog, counts, obs, submission};

    #[test]
    fn test_recency_counters() {
        let cat = catalog(&["D1", "D2", "D3"]);
        let mut model = EncounteredBeforeModel::new(&cat);
        model.update(
            &cat,
            &[
                obs("s1", "alice", "t1", 0, &[("D1", 1)]),
                obs("s2", "alice", "t1", 1, &[("D2", 3)]),
                obs("s3", "alice", "t1", 2, &[]),
            ],
        );
        let row = model.history("alice").unwrap();
        assert_eq!(row.submissions, 3);
        assert_eq!(row.since_last, vec![Some(2), Some(1), None]);
        assert_eq!(row.scores(), vec![1.0 / 3.0, 0.5, 0.0]);
    }

    #[test]
    fn test_recency_replays_in_timestamp_order() {
        let cat = catalog(&["D1"]);
        let mut model = EncounteredBeforeModel::new(&cat);
        // Delivered out of order; the later submission (minute 5) lacks D1.
        model.update(
            &cat,
            &[
                obs("late", "bob", "t1", 5, &[]),
                obs("early", "bob", "t1", 1, &[("D1", 1)]),
            ],
        );
        assert_eq!(model.history("bob").unwrap().since_last, vec![Some(1)]);
    }

    #[test]
    fn test_recency_most_recent_scores_one() {
        let cat = catalog(&["D1", "D2"]);
        let mut model = EncounteredBeforeModel::new(&cat);
        model.update(&cat, &[obs("s1", "alice", "t1", 0, &[("D1", 1)])]);
        let sub = submission("n", "alice", "t2", 1);
        let c = counts(&[("D1", 1), ("D2", 1)]);
        assert_eq!(model.measure(&cat, &sub, &c), vec![1.0, 0.0]);
        let stranger = submission("m", "zed", "t2", 1);
        assert_eq!(model.measure(&cat, &stranger, &c), vec![0.0, 0.0]);
    }

    #[test]
    fn test_multiplicity_z_includes_zero_counts() {
        let cat = catalog(&["D1"]);
        let mut model = DefectMultiplicityModel::new(&cat);
        // Counts 0 and 2: mean 1, population std 1.
        model.update(
            &cat,
            &[
                obs("s1", "a", "t1", 0, &[]),
                obs("s2", "b", "t1", 1, &[("D1", 2)]),
            ],
        );
        let sub = submission("n", "c", "t1", 2);
        let z = model.measure(&cat, &sub, &counts(&[("D1", 4)]))[0];
        assert!((z - 3.0).abs() < 1e-9, "{z}");
        assert_eq!(model.observations(&sub), 2);
    }

    #[test]
    fn test_multiplicity_score_is_magnitude() {
        let cat = catalog(&["D1"]);
        let mut model = DefectMultiplicityModel::new(&cat);
        model.update(
            &cat,
            &[
                obs("s1", "a", "t1", 0, &[("D1", 1)]),
                obs("s2", "b", "t1", 1, &[("D1", 5)]),
            ],
        );
        let sub = submission("n", "c", "t1", 2);
        let c = counts(&[("D1", 1)]);
        assert!(model.measure(&cat, &sub, &c)[0] < 0.0);
        assert!(model.score(&cat, &sub, &c)[0] > 0.0);
    }

    #[test]
    fn test_multiplicity_weights_rows() {
        let cat = catalog(&["D1", "D2"]);
        let mut model = DefectMultiplicityModel::new(&cat);
        assert!(model.weights(&cat).is_empty());
        model.update(&cat, &[obs("s1", "a", "t1", 0, &[("D1", 3)])]);
        let w = model.weights(&cat);
        assert_eq!(w.rows.keys().collect::<Vec<_>>(), vec!["mean", "std"]);
        assert_eq!(w.row("mean").unwrap(), &[3.0, 0.0]);
    }
}
