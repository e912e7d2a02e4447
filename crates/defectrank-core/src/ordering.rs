//! Pairwise defect comparisons and their resolution into one ranking.
//!
//! Each [`PairwiseComparison`] says which of two present defects should be
//! explained first, with a signed tiebreak score. The rows of one submission
//! need not be transitive. [`rank_defects`] turns them into a total order by
//! repeatedly removing an undominated node from the comparison graph. When a
//! cycle leaves no undominated node, the node with the largest net tiebreak
//! weight (outgoing minus incoming) goes next. That fallback is a heuristic:
//! it is deterministic and explainable but does not minimise the number of
//! violated comparisons.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::catalog::{DefectId, SubmissionId};
use crate::error::{RankError, Result};

// ---------------------------------------------------------------------------
// Comparison rows
// ---------------------------------------------------------------------------

/// Which side of a comparison was predicted to win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// Which heuristic decided a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    Primary,
    Secondary,
}

/// One predicted comparison between two defects of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseComparison {
    pub submission: SubmissionId,
    pub left: DefectId,
    pub right: DefectId,
    pub winner: Side,
    /// Signed strength, oriented left minus right.
    pub tiebreak: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basis: Option<Basis>,
}

impl PairwiseComparison {
    pub fn winner_id(&self) -> &str {
        match self.winner {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn loser_id(&self) -> &str {
        match self.winner {
            Side::Left => &self.right,
            Side::Right => &self.left,
        }
    }

    /// Weight of the winner → loser edge: the tiebreak seen from the winner.
    pub fn edge_weight(&self) -> f64 {
        match self.winner {
            Side::Left => self.tiebreak,
            Side::Right => -self.tiebreak,
        }
    }

    fn pair_key(&self) -> (DefectId, DefectId) {
        if self.left <= self.right {
            (self.left.clone(), self.right.clone())
        } else {
            (self.right.clone(), self.left.clone())
        }
    }
}

/// Compare every pair of `present` defects with a primary heuristic and fall
/// back to a secondary one on ties.
///
/// The left defect of a row is the one listed first in `present`. It wins on a
/// strictly higher primary score; on a primary tie it wins only on a strictly
/// higher secondary score. The tiebreak is always the secondary difference.
/// Defects missing from a score map score 0.
pub fn pairwise_from_scores(
    submission: &str,
    present: &[DefectId],
    primary: &BTreeMap<DefectId, f64>,
    secondary: &BTreeMap<DefectId, f64>,
) -> Vec<PairwiseComparison> {
    let get = |map: &BTreeMap<DefectId, f64>, id: &DefectId| map.get(id).copied().unwrap_or(0.0);
    let mut rows = Vec::new();
    for (i, left) in present.iter().enumerate() {
        for right in &present[i + 1..] {
            let (p_left, p_right) = (get(primary, left), get(primary, right));
            let (s_left, s_right) = (get(secondary, left), get(secondary, right));
            let (winner, basis) = if p_left > p_right {
                (Side::Left, Basis::Primary)
            } else if p_right > p_left {
                (Side::Right, Basis::Primary)
            } else if s_left > s_right {
                (Side::Left, Basis::Secondary)
            } else {
                (Side::Right, Basis::Secondary)
            };
            rows.push(PairwiseComparison {
                submission: submission.to_string(),
                left: left.clone(),
                right: right.clone(),
                winner,
                tiebreak: s_left - s_right,
                basis: Some(basis),
            });
        }
    }
    rows
}

// ---------------------------------------------------------------------------
// Tournament resolution
// ---------------------------------------------------------------------------

/// Check that `rows` compare every pair of `defects` of `submission` exactly
/// once and nothing else.
fn validate_rows(
    submission: &str,
    defects: &BTreeSet<DefectId>,
    rows: &[PairwiseComparison],
) -> Result<()> {
    if defects.is_empty() {
        return Err(RankError::NoDefects {
            submission: submission.to_string(),
        });
    }

    let mut seen = BTreeSet::new();
    for row in rows {
        if row.submission != submission {
            return Err(RankError::MixedSubmissions {
                expected: submission.to_string(),
                found: row.submission.clone(),
            });
        }
        if row.left == row.right {
            return Err(RankError::SelfComparison {
                submission: submission.to_string(),
                id: row.left.clone(),
            });
        }
        for id in [&row.left, &row.right] {
            if !defects.contains(id) {
                return Err(RankError::UnexpectedDefect {
                    submission: submission.to_string(),
                    id: id.clone(),
                });
            }
        }
        let key = row.pair_key();
        if !seen.insert(key.clone()) {
            return Err(RankError::DuplicatePair {
                submission: submission.to_string(),
                a: key.0,
                b: key.1,
            });
        }
    }

    for (i, a) in defects.iter().enumerate() {
        for b in defects.iter().skip(i + 1) {
            if !seen.contains(&(a.clone(), b.clone())) {
                return Err(RankError::MissingPair {
                    submission: submission.to_string(),
                    a: a.clone(),
                    b: b.clone(),
                });
            }
        }
    }
    Ok(())
}

fn weight_sum(graph: &StableDiGraph<DefectId, f64>, node: NodeIndex, dir: Direction) -> f64 {
    graph.edges_directed(node, dir).map(|e| *e.weight()).sum()
}

/// Highest score wins; equal scores go to the smallest defect id.
fn pick_best(
    graph: &StableDiGraph<DefectId, f64>,
    candidates: &[NodeIndex],
    score: impl Fn(NodeIndex) -> f64,
) -> Option<NodeIndex> {
    candidates.iter().copied().max_by(|&a, &b| {
        score(a)
            .partial_cmp(&score(b))
            .unwrap_or(Ordering::Equal)
            .then_with(|| graph[b].cmp(&graph[a]))
    })
}

/// Resolve the comparisons of one submission into a ranking of `defects`,
/// highest priority first.
///
/// Every unordered pair of `defects` must be compared exactly once. A single
/// defect needs no rows. Malformed input fails instead of producing a partial
/// ranking.
pub fn rank_defects(
    submission: &str,
    defects: &[DefectId],
    rows: &[PairwiseComparison],
) -> Result<Vec<DefectId>> {
    let nodes: BTreeSet<DefectId> = defects.iter().cloned().collect();
    validate_rows(submission, &nodes, rows)?;

    let mut graph: StableDiGraph<DefectId, f64> = StableDiGraph::new();
    let index: BTreeMap<DefectId, NodeIndex> = nodes
        .iter()
        .map(|id| (id.clone(), graph.add_node(id.clone())))
        .collect();
    for row in rows {
        let (Some(&from), Some(&to)) = (index.get(row.winner_id()), index.get(row.loser_id()))
        else {
            continue;
        };
        graph.add_edge(from, to, row.edge_weight());
    }

    let mut ranking = Vec::with_capacity(nodes.len());
    while graph.node_count() > 0 {
        let remaining: Vec<NodeIndex> = graph.node_indices().collect();
        let sources: Vec<NodeIndex> = remaining
            .iter()
            .copied()
            .filter(|&n| graph.edges_directed(n, Direction::Incoming).next().is_none())
            .collect();

        let next = if sources.is_empty() {
            log::debug!(
                "submission {submission}: cycle among {} defects, using net tiebreak weight",
                remaining.len()
            );
            pick_best(&graph, &remaining, |n| {
                weight_sum(&graph, n, Direction::Outgoing) - weight_sum(&graph, n, Direction::Incoming)
            })
        } else {
            pick_best(&graph, &sources, |n| weight_sum(&graph, n, Direction::Outgoing))
        };
        let Some(next) = next else { break };
        if let Some(id) = graph.remove_node(next) {
            ranking.push(id);
        }
    }
    Ok(ranking)
}

/// Resolve one submission's comparisons, taking the defects from the rows.
///
/// Use [`rank_defects`] for a submission with a single present defect, which
/// has no rows.
pub fn rank_submission(submission: &str, rows: &[PairwiseComparison]) -> Result<Vec<DefectId>> {
    let defects: Vec<DefectId> = rows
        .iter()
        .flat_map(|r| [r.left.clone(), r.right.clone()])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    rank_defects(submission, &defects, rows)
}

/// Group rows by submission and rank each group.
pub fn rank_all(rows: &[PairwiseComparison]) -> Result<BTreeMap<SubmissionId, Vec<DefectId>>> {
    let mut grouped: BTreeMap<SubmissionId, Vec<PairwiseComparison>> = BTreeMap::new();
    for row in rows {
        grouped
            .entry(row.submission.clone())
            .or_default()
            .push(row.clone());
    }
    grouped
        .into_iter()
        .map(|(submission, rows)| {
            let ranking = rank_submission(&submission, &rows)?;
            Ok((submission, ranking))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<DefectId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(left: &str, right: &str, winner: Side, tiebreak: f64) -> PairwiseComparison {
        PairwiseComparison {
            submission: "s1".into(),
            left: left.into(),
            right: right.into(),
            winner,
            tiebreak,
            basis: None,
        }
    }

    fn scores(pairs: &[(&str, f64)]) -> BTreeMap<DefectId, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    // -----------------------------------------------------------------------
    // Pairwise predictor
    // -----------------------------------------------------------------------

    #[test]
    fn test_pairwise_primary_decides() {
        let rows = pairwise_from_scores(
            "s1",
            &ids(&["A", "B"]),
            &scores(&[("A", 1.0), ("B", 3.0)]),
            &scores(&[("A", 5.0), ("B", 2.0)]),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].winner, Side::Right);
        assert_eq!(rows[0].basis, Some(Basis::Primary));
        assert_eq!(rows[0].tiebreak, 3.0);
        assert_eq!(rows[0].edge_weight(), -3.0);
    }

    #[test]
    fn test_pairwise_secondary_breaks_ties() {
        let primary = scores(&[("A", 2.0), ("B", 2.0)]);
        let rows = pairwise_from_scores("s1", &ids(&["A", "B"]), &primary, &scores(&[("A", 4.0)]));
        assert_eq!(rows[0].winner, Side::Left);
        assert_eq!(rows[0].basis, Some(Basis::Secondary));

        let rows = pairwise_from_scores("s1", &ids(&["A", "B"]), &primary, &scores(&[]));
        assert_eq!(rows[0].winner, Side::Right);
    }

    #[test]
    fn test_pairwise_covers_every_pair_once() {
        let rows = pairwise_from_scores("s1", &ids(&["A", "B", "C", "D"]), &scores(&[]), &scores(&[]));
        assert_eq!(rows.len(), 6);
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    #[test]
    fn test_transitive_rows_follow_score_order() {
        let present = ids(&["D1", "D2", "D3", "D4", "D5"]);
        let s = scores(&[("D1", 0.2), ("D2", 4.0), ("D3", -1.0), ("D4", 2.5), ("D5", 3.0)]);
        let rows = pairwise_from_scores("s1", &present, &s, &s);
        let ranking = rank_submission("s1", &rows).unwrap();
        assert_eq!(ranking, ids(&["D2", "D5", "D4", "D1", "D3"]));
    }

    #[test]
    fn test_three_cycle_terminates_with_permutation() {
        let rows = vec![
            row("A", "B", Side::Left, 1.0),
            row("B", "C", Side::Left, 1.0),
            row("A", "C", Side::Right, -1.0),
        ];
        let ranking = rank_submission("s1", &rows).unwrap();
        let mut sorted = ranking.clone();
        sorted.sort();
        assert_eq!(sorted, ids(&["A", "B", "C"]));
        // All nets tie at zero, so the smallest id goes first; B then beats C.
        assert_eq!(ranking, ids(&["A", "B", "C"]));
    }

    #[test]
    fn test_cycle_prefers_most_dominant_node() {
        // A→B (3), B→C (1), C→A (1): net A = 2, B = -2, C = 0.
        let rows = vec![
            row("A", "B", Side::Left, 3.0),
            row("B", "C", Side::Left, 1.0),
            row("C", "A", Side::Left, 1.0),
        ];
        assert_eq!(rank_submission("s1", &rows).unwrap(), ids(&["A", "B", "C"]));
    }

    #[test]
    fn test_undominated_defect_goes_first() {
        // B→A (1), C→A (5), B→C (0): C has the larger weight but B beats it.
        let rows = vec![
            row("A", "B", Side::Right, -1.0),
            row("A", "C", Side::Right, -5.0),
            row("B", "C", Side::Left, 0.0),
        ];
        assert_eq!(rank_submission("s1", &rows).unwrap(), ids(&["B", "C", "A"]));
    }

    #[test]
    fn test_two_defects_and_single_defect() {
        let rows = vec![row("X", "Y", Side::Left, 0.0)];
        assert_eq!(rank_submission("s1", &rows).unwrap(), ids(&["X", "Y"]));
        let ranking = rank_defects("s1", &ids(&["Q"]), &[]).unwrap();
        assert_eq!(ranking, ids(&["Q"]));
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let present = ids(&["E", "C", "A", "D", "B"]);
        let flat = scores(&[]);
        let rows = pairwise_from_scores("s1", &present, &flat, &flat);
        let first = rank_submission("s1", &rows).unwrap();
        for _ in 0..5 {
            assert_eq!(rank_submission("s1", &rows).unwrap(), first);
        }
    }

    // -----------------------------------------------------------------------
    // Malformed input
    // -----------------------------------------------------------------------

    #[test]
    fn test_no_defects_is_an_error() {
        assert!(matches!(
            rank_defects("s1", &[], &[]),
            Err(RankError::NoDefects { .. })
        ));
        assert!(matches!(
            rank_submission("s1", &[]),
            Err(RankError::NoDefects { .. })
        ));
    }

    #[test]
    fn test_missing_pair_is_an_error() {
        let rows = vec![row("A", "B", Side::Left, 0.0), row("B", "C", Side::Left, 0.0)];
        match rank_submission("s1", &rows) {
            Err(RankError::MissingPair { a, b, .. }) => assert_eq!((a.as_str(), b.as_str()), ("A", "C")),
            other => panic!("expected MissingPair, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_pair_is_an_error() {
        let rows = vec![row("A", "B", Side::Left, 0.0), row("B", "A", Side::Left, 0.0)];
        assert!(matches!(
            rank_submission("s1", &rows),
            Err(RankError::DuplicatePair { .. })
        ));
    }

    #[test]
    fn test_foreign_rows_are_errors() {
        let mut other = row("A", "B", Side::Left, 0.0);
        other.submission = "s2".into();
        assert!(matches!(
            rank_submission("s1", &[other]),
            Err(RankError::MixedSubmissions { .. })
        ));
        assert!(matches!(
            rank_defects("s1", &ids(&["A"]), &[row("A", "Z", Side::Left, 0.0)]),
            Err(RankError::UnexpectedDefect { .. })
        ));
        assert!(matches!(
            rank_defects("s1", &ids(&["A"]), &[row("A", "A", Side::Left, 0.0)]),
            Err(RankError::SelfComparison { .. })
        ));
    }

    #[test]
    fn test_rank_all_groups_by_submission() {
        let mut rows = vec![row("A", "B", Side::Right, 0.0)];
        let mut second = row("C", "D", Side::Left, 0.0);
        second.submission = "s2".into();
        rows.push(second);
        let ranked = rank_all(&rows).unwrap();
        assert_eq!(ranked["s1"], ids(&["B", "A"]));
        assert_eq!(ranked["s2"], ids(&["C", "D"]));
    }
}
