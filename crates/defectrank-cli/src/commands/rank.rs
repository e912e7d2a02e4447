//! `defectrank rank`: resolve pairwise comparisons into one ranking per submission.

use std::collections::BTreeMap;
use std::path::Path;

use defectrank_core::{
    DefectExplanation, PairwiseComparison, RankerConfig, ScoringModel, explain_ranking,
    pairwise_from_scores, rank_defects, rank_submission,
};
use serde::Serialize;

use super::Dataset;

pub struct RankCommandConfig<'a> {
    pub data_dir: &'a str,
    pub pairs_path: Option<&'a str>,
    pub primary_path: Option<&'a str>,
    pub secondary_path: Option<&'a str>,
    pub submission: Option<&'a str>,
    pub explain: bool,
    pub output_path: Option<&'a str>,
    pub config_path: Option<&'a str>,
}

#[derive(Serialize)]
struct RankedSubmission {
    submission: String,
    ranking: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanations: Option<Vec<DefectExplanation>>,
}

/// Heuristic names used in explanation sentences.
struct Heuristics {
    primary: String,
    secondary: String,
}

pub fn run(cfg: RankCommandConfig<'_>) {
    let config = super::load_config(cfg.config_path);
    let data = super::load_dataset(cfg.data_dir);

    let (rows, heuristics) = match (cfg.pairs_path, cfg.primary_path, cfg.secondary_path) {
        (Some(pairs), _, _) => (read_pairs(pairs), None),
        (None, Some(primary), Some(secondary)) => {
            let primary = super::load_model(primary, &data.catalog);
            let secondary = super::load_model(secondary, &data.catalog);
            let heuristics = Heuristics {
                primary: primary.info().measure_description.to_lowercase(),
                secondary: secondary.info().measure_description.to_lowercase(),
            };
            (predict_pairs(&data, &primary, &secondary, cfg.submission), Some(heuristics))
        }
        _ => super::fail("pass either --pairs or both --primary and --secondary"),
    };

    let mut grouped: BTreeMap<String, Vec<PairwiseComparison>> = BTreeMap::new();
    for row in rows {
        if cfg.submission.is_none_or(|s| s == row.submission) {
            grouped.entry(row.submission.clone()).or_default().push(row);
        }
    }
    // Single-defect submissions have no comparisons but still get a ranking.
    if heuristics.is_some() {
        for s in &data.submissions {
            let present = data.present_defects(&s.id);
            if present.len() == 1 && cfg.submission.is_none_or(|only| only == s.id) {
                grouped.entry(s.id.clone()).or_default();
            }
        }
    }

    let ranked = rank_groups(&data, grouped, heuristics.as_ref(), cfg.explain, &config)
        .unwrap_or_else(|e| super::fail(e));
    for entry in &ranked {
        print_ranking(entry);
    }
    if ranked.is_empty() {
        println!("No submissions with defects to rank.");
    }
    if let Some(path) = cfg.output_path {
        super::write_json(path, &ranked);
    }
}

fn read_pairs(path: &str) -> Vec<PairwiseComparison> {
    let raw = std::fs::read_to_string(Path::new(path))
        .unwrap_or_else(|e| super::fail(format!("cannot read {path}: {e}")));
    serde_json::from_str(&raw).unwrap_or_else(|e| super::fail(format!("cannot parse {path}: {e}")))
}

fn predict_pairs(
    data: &Dataset,
    primary: &ScoringModel,
    secondary: &ScoringModel,
    only: Option<&str>,
) -> Vec<PairwiseComparison> {
    let mut rows = Vec::new();
    for s in &data.submissions {
        if only.is_some_and(|id| id != s.id) {
            continue;
        }
        let counts = data.counts_for(&s.id);
        let present = data.present_defects(&s.id);
        let p = data.catalog.label(&primary.score(s, &counts));
        let q = data.catalog.label(&secondary.score(s, &counts));
        rows.extend(pairwise_from_scores(&s.id, &present, &p, &q));
    }
    rows
}

/// Resolve one submission. A submission the dataset has counts for must be
/// ranked over exactly its present defects, so a pairs file that leaves one
/// out is rejected. Unknown submissions take their defects from the rows.
fn rank_one(
    data: &Dataset,
    submission: &str,
    rows: &[PairwiseComparison],
) -> defectrank_core::Result<Vec<String>> {
    if data.counts.contains_key(submission) {
        rank_defects(submission, &data.present_defects(submission), rows)
    } else {
        rank_submission(submission, rows)
    }
}

fn rank_groups(
    data: &Dataset,
    grouped: BTreeMap<String, Vec<PairwiseComparison>>,
    heuristics: Option<&Heuristics>,
    explain: bool,
    config: &RankerConfig,
) -> Result<Vec<RankedSubmission>, String> {
    let mut ranked = Vec::new();
    for (submission, rows) in grouped {
        let ranking = rank_one(data, &submission, &rows)
            .map_err(|e| format!("cannot rank submission {submission}: {e}"))?;
        let explanations = explain.then(|| {
            let (primary, secondary) = match heuristics {
                Some(h) => (h.primary.as_str(), h.secondary.as_str()),
                None => ("primary", "the secondary heuristic"),
            };
            explain_ranking(&rows, &ranking, primary, secondary, config.max_explanation_length)
        });
        ranked.push(RankedSubmission {
            submission,
            ranking,
            explanations,
        });
    }
    Ok(ranked)
}

fn print_ranking(entry: &RankedSubmission) {
    println!("Submission {}:", entry.submission);
    for (i, defect) in entry.ranking.iter().enumerate() {
        println!("  {}. {defect}", i + 1);
        let explanation = entry
            .explanations
            .as_ref()
            .and_then(|all| all.iter().find(|e| &e.defect == defect));
        for sentence in explanation.iter().flat_map(|e| &e.sentences) {
            println!("       {sentence}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{DEFECTS, dataset_dir};
    use defectrank_core::RankError;

    const THREE_DEFECTS: &str = r#"[
        {"id": "D1", "name": "Unused variable", "severity": 2},
        {"id": "D2", "name": "Magic number", "severity": 1},
        {"id": "D3", "name": "Long function", "severity": 3}
    ]"#;

    const S1: &str = r#"[
        {"id": "s1", "student": "ana", "task": "t1", "timestamp": "2025-03-01T10:00:00Z"}
    ]"#;

    fn pair(left: &str, right: &str, winner: &str) -> String {
        let tiebreak = if winner == "left" { 0.5 } else { -0.5 };
        format!(
            r#"{{"submission": "s1", "left": "{left}", "right": "{right}", "winner": "{winner}", "tiebreak": {tiebreak}}}"#
        )
    }

    fn write_pairs(dir: &Path, rows: &[String]) -> String {
        let path = dir.join("pairs.json");
        std::fs::write(&path, format!("[{}]", rows.join(","))).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn three_defect_dataset() -> (tempfile::TempDir, Dataset) {
        let dir = dataset_dir(&[
            ("defects.json", THREE_DEFECTS),
            ("submissions.json", S1),
            ("defect_counts.json", r#"{"s1": {"D1": 1, "D2": 1, "D3": 2}}"#),
        ]);
        let data = Dataset::load(dir.path()).unwrap();
        (dir, data)
    }

    #[test]
    fn test_pairs_missing_a_present_defect_are_rejected() {
        let (dir, data) = three_defect_dataset();
        let rows = read_pairs(&write_pairs(dir.path(), &[pair("D1", "D2", "left")]));
        assert!(matches!(
            rank_one(&data, "s1", &rows),
            Err(RankError::MissingPair { .. })
        ));

        let grouped = BTreeMap::from([("s1".to_string(), rows)]);
        let config = RankerConfig::default();
        assert!(rank_groups(&data, grouped, None, false, &config).is_err());
    }

    #[test]
    fn test_complete_pairs_rank_every_present_defect() {
        let (dir, data) = three_defect_dataset();
        let rows = read_pairs(&write_pairs(
            dir.path(),
            &[
                pair("D1", "D2", "left"),
                pair("D1", "D3", "right"),
                pair("D2", "D3", "right"),
            ],
        ));
        assert_eq!(rank_one(&data, "s1", &rows).unwrap(), vec!["D3", "D1", "D2"]);
    }

    #[test]
    fn test_unknown_submission_ranks_from_rows() {
        let dir = dataset_dir(&[("defects.json", DEFECTS)]);
        let data = Dataset::load(dir.path()).unwrap();
        let rows = read_pairs(&write_pairs(dir.path(), &[pair("D1", "D2", "right")]));
        assert_eq!(rank_one(&data, "s1", &rows).unwrap(), vec!["D2", "D1"]);
    }
}
