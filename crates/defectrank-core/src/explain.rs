//! Plain-language reasons for a resolved ranking.
//!
//! A defect is explained by the lower-ranked defects it beat in comparisons
//! that agree with the final order, grouped by the heuristic that decided each
//! comparison.

use std::collections::HashMap;

use serde::Serialize;

use crate::catalog::DefectId;
use crate::ordering::{Basis, PairwiseComparison};

/// Shown when no agreeing comparison supports a defect.
pub const NO_SUPPORT: &str = "No strong heuristic differences compared to lower-ranked defects.";

/// Reasons for one defect's position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefectExplanation {
    pub defect: DefectId,
    /// 1-based.
    pub rank: usize,
    pub sentences: Vec<String>,
}

fn peer_list(peers: &[&str], rank_of: &HashMap<&str, usize>) -> String {
    let noun = if peers.len() == 1 { "defect" } else { "defects" };
    let listed: Vec<String> = peers
        .iter()
        .map(|p| format!("{p} (rank {})", rank_of.get(p).copied().unwrap_or(0)))
        .collect();
    format!("{noun} {}", listed.join(", "))
}

/// Explain every position of `ranking`.
///
/// `primary` and `secondary` name the heuristics in lowercase prose (e.g.
/// `"task commonality"`). Rows without a recorded basis count as primary.
/// At most `max_len` sentences are kept per defect.
pub fn explain_ranking(
    rows: &[PairwiseComparison],
    ranking: &[DefectId],
    primary: &str,
    secondary: &str,
    max_len: usize,
) -> Vec<DefectExplanation> {
    let rank_of: HashMap<&str, usize> = ranking
        .iter()
        .enumerate()
        .map(|(i, d)| (d.as_str(), i + 1))
        .collect();
    let mut by_pair: HashMap<(&str, &str), &PairwiseComparison> = HashMap::new();
    for row in rows {
        by_pair.insert((row.left.as_str(), row.right.as_str()), row);
        by_pair.insert((row.right.as_str(), row.left.as_str()), row);
    }

    ranking
        .iter()
        .enumerate()
        .map(|(i, defect)| {
            let mut primary_peers = Vec::new();
            let mut secondary_peers = Vec::new();
            for other in &ranking[i + 1..] {
                let Some(row) = by_pair.get(&(defect.as_str(), other.as_str())) else {
                    continue;
                };
                if row.winner_id() != defect {
                    continue;
                }
                match row.basis.unwrap_or(Basis::Primary) {
                    Basis::Primary => primary_peers.push(other.as_str()),
                    Basis::Secondary => secondary_peers.push(other.as_str()),
                }
            }

            let mut sentences = Vec::new();
            if !primary_peers.is_empty() {
                sentences.push(format!(
                    "Ranked above {} because its {primary} score is higher.",
                    peer_list(&primary_peers, &rank_of)
                ));
            }
            if !secondary_peers.is_empty() {
                sentences.push(format!(
                    "Tied on the main heuristic but ranked above {} due to {secondary}.",
                    peer_list(&secondary_peers, &rank_of)
                ));
            }
            if sentences.is_empty() {
                sentences.push(NO_SUPPORT.to_string());
            }
            sentences.truncate(max_len.max(1));

            DefectExplanation {
                defect: defect.clone(),
                rank: i + 1,
                sentences,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering::{Side, pairwise_from_scores, rank_submission};
    use std::collections::BTreeMap;

    fn scores(pairs: &[(&str, f64)]) -> BTreeMap<DefectId, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn ids(names: &[&str]) -> Vec<DefectId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_primary_and_secondary_sentences() {
        let present = ids(&["A", "B", "C"]);
        let primary = scores(&[("A", 3.0), ("B", 1.0), ("C", 1.0)]);
        let secondary = scores(&[("A", 0.0), ("B", 2.0), ("C", 1.0)]);
        let rows = pairwise_from_scores("s1", &present, &primary, &secondary);
        let ranking = rank_submission("s1", &rows).unwrap();
        assert_eq!(ranking, ids(&["A", "B", "C"]));

        let out = explain_ranking(&rows, &ranking, "severity", "task commonality", 3);
        assert_eq!(
            out[0].sentences,
            vec!["Ranked above defects B (rank 2), C (rank 3) because its severity score is higher."]
        );
        assert_eq!(
            out[1].sentences,
            vec!["Tied on the main heuristic but ranked above defect C (rank 3) due to task commonality."]
        );
        assert_eq!(out[2].sentences, vec![NO_SUPPORT]);
        assert_eq!(out[2].rank, 3);
    }

    #[test]
    fn test_disagreeing_rows_do_not_support() {
        // Cycle: A beats B, B beats C, C beats A. Resolved as A, B, C.
        let row = |l: &str, r: &str| PairwiseComparison {
            submission: "s1".into(),
            left: l.into(),
            right: r.into(),
            winner: Side::Left,
            tiebreak: 1.0,
            basis: None,
        };
        let rows = vec![row("A", "B"), row("B", "C"), row("C", "A")];
        let ranking = rank_submission("s1", &rows).unwrap();
        assert_eq!(ranking, ids(&["A", "B", "C"]));
        let out = explain_ranking(&rows, &ranking, "p", "s", 3);
        assert_eq!(out[0].sentences, vec!["Ranked above defect B (rank 2) because its p score is higher."]);
    }

    #[test]
    fn test_sentences_truncated() {
        let present = ids(&["A", "B", "C"]);
        let primary = scores(&[("A", 3.0), ("B", 3.0), ("C", 1.0)]);
        let secondary = scores(&[("A", 1.0), ("B", 0.0)]);
        let rows = pairwise_from_scores("s1", &present, &primary, &secondary);
        let ranking = rank_submission("s1", &rows).unwrap();
        let out = explain_ranking(&rows, &ranking, "p", "s", 1);
        assert_eq!(out[0].defect, "A");
        assert_eq!(out[0].sentences.len(), 1);
    }
}
