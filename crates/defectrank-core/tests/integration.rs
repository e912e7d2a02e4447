//! End-to-end pipeline tests: train, prioritize, rank, explain, survey, persist.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use defectrank_core::{
    Defect, DefectCatalog, DefectCounts, ModelKind, NextQuestion, Observation, PairwiseComparison,
    Question, RankerConfig, ResponseRecord, ScoringModel, Submission, explain_ranking,
    pairwise_from_scores, rank_defects, select_next_question,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn defect(id: &str, severity: u8) -> Defect {
    Defect {
        id: id.into(),
        name: format!("{id} name"),
        description: String::new(),
        severity,
        kind: "style".into(),
        detector_codes: vec![],
        example: None,
        fix: None,
    }
}

fn catalog() -> Arc<DefectCatalog> {
    Arc::new(
        DefectCatalog::new(vec![
            defect("unused-variable", 2),
            defect("magic-number", 1),
            defect("long-function", 3),
            defect("redundant-if", 4),
        ])
        .unwrap(),
    )
}

fn submission(id: &str, student: &str, task: &str, minute: u32) -> Submission {
    Submission {
        id: id.into(),
        student: student.into(),
        task: task.into(),
        code: String::new(),
        correct: false,
        timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 9, minute, 0).unwrap(),
    }
}

fn counts(pairs: &[(&str, u32)]) -> DefectCounts {
    pairs.iter().map(|(id, c)| (*id, *c)).collect()
}

fn history() -> Vec<Observation> {
    let rows: [(&str, &str, &str, &[(&str, u32)]); 8] = [
        ("s1", "ana", "fizzbuzz", &[("magic-number", 3), ("redundant-if", 1)]),
        ("s2", "ana", "fizzbuzz", &[("magic-number", 2)]),
        ("s3", "ben", "fizzbuzz", &[("magic-number", 1), ("unused-variable", 1)]),
        ("s4", "ben", "primes", &[("long-function", 1)]),
        ("s5", "cyd", "primes", &[("long-function", 1), ("unused-variable", 2)]),
        ("s6", "cyd", "fizzbuzz", &[("magic-number", 1)]),
        ("s7", "ana", "primes", &[("redundant-if", 2)]),
        ("s8", "ben", "primes", &[]),
    ];
    rows.iter()
        .enumerate()
        .map(|(i, (id, student, task, pairs))| {
            Observation::new(submission(id, student, task, i as u32), counts(pairs))
        })
        .collect()
}

fn response(submission: &str, respondent: &str, answer: &str) -> ResponseRecord {
    ResponseRecord {
        submission: submission.into(),
        respondent: respondent.into(),
        answer: answer.into(),
        comment: String::new(),
        timestamp: Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap(),
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[test]
fn train_prioritize_rank_explain() {
    let catalog = catalog();
    let config = RankerConfig::default();
    let mut common = ScoringModel::build(ModelKind::TaskCommon, catalog.clone(), &config);
    let severity = ScoringModel::build(ModelKind::Severity, catalog.clone(), &config);
    common.update(&history()).unwrap();

    let new = submission("s9", "dee", "fizzbuzz", 30);
    let found = counts(&[("magic-number", 1), ("unused-variable", 1), ("redundant-if", 1)]);

    // Priorities cover exactly the present defects.
    let priorities = common.prioritize(&new, &found);
    let total: f64 = priorities.iter().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert_eq!(priorities[catalog.position("long-function").unwrap()], 0.0);

    // Discrete levels exist for present defects of a well-observed task.
    let levels = common.discretize(&new, &found);
    assert_eq!(levels[catalog.position("long-function").unwrap()], None);
    for id in ["magic-number", "unused-variable", "redundant-if"] {
        let level = levels[catalog.position(id).unwrap()].unwrap();
        assert!((1..=5).contains(&level), "{id}: {level}");
    }

    // magic-number appears in every fizzbuzz submission: it leads the ranking.
    let present: Vec<String> = found.present().map(str::to_string).collect();
    let primary = catalog.label(&common.score(&new, &found));
    let secondary = catalog.label(&severity.score(&new, &found));
    let rows = pairwise_from_scores(&new.id, &present, &primary, &secondary);
    assert_eq!(rows.len(), 3);
    let ranking = rank_defects(&new.id, &present, &rows).unwrap();
    assert_eq!(ranking.len(), 3);
    assert_eq!(ranking[0], "magic-number");

    let explanations = explain_ranking(&rows, &ranking, "task commonality", "severity", 3);
    assert_eq!(explanations.len(), 3);
    assert!(explanations[0].sentences[0].starts_with("Ranked above defects"));
}

#[test]
fn new_student_and_task_degrade_to_neutral() {
    let catalog = catalog();
    let config = RankerConfig::default();
    let stranger = submission("x", "nobody", "unknown-task", 45);
    let found = counts(&[("magic-number", 1), ("long-function", 1)]);

    for kind in [
        ModelKind::TaskCommon,
        ModelKind::TaskCharacteristic,
        ModelKind::StudentFrequency,
        ModelKind::StudentCharacteristic,
        ModelKind::StudentEncounteredBefore,
    ] {
        let mut model = ScoringModel::build(kind, catalog.clone(), &config);
        model.update(&history()).unwrap();
        assert_eq!(model.score(&stranger, &found), vec![0.0; 4], "{kind}");
        assert!(model.discretize(&stranger, &found).iter().all(Option::is_none), "{kind}");
        let p = model.prioritize(&stranger, &found);
        assert!((p[1] - 0.5).abs() < 1e-12 && (p[2] - 0.5).abs() < 1e-12, "{kind}");
    }
}

#[test]
fn saved_model_keeps_learning() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("student-frequency.json");
    let catalog = catalog();
    let config = RankerConfig::default();
    let all = history();
    let (first, second) = all.split_at(5);

    let mut model = ScoringModel::build(ModelKind::StudentFrequency, catalog.clone(), &config);
    model.update(first).unwrap();
    model.save(&path).unwrap();

    let mut resumed = ScoringModel::load_as(&path, catalog.clone(), ModelKind::StudentFrequency).unwrap();
    resumed.update(second).unwrap();

    let mut direct = ScoringModel::build(ModelKind::StudentFrequency, catalog, &config);
    direct.update(&all).unwrap();

    let (a, b) = (resumed.weights(), direct.weights());
    for (student, row) in &a.rows {
        for (x, y) in row.iter().zip(&b.rows[student]) {
            assert!((x - y).abs() < 1e-9, "{student}: {x} vs {y}");
        }
    }
}

// ---------------------------------------------------------------------------
// Survey
// ---------------------------------------------------------------------------

#[test]
fn survey_covers_then_refines_then_stops() {
    let questions = vec![
        Question {
            submission: "s1".into(),
            defects: vec!["magic-number".into(), "redundant-if".into()],
        },
        Question {
            submission: "s3".into(),
            defects: vec!["magic-number".into(), "unused-variable".into()],
        },
    ];
    let mut rng = StdRng::seed_from_u64(42);
    let mut responses = vec![response("s1", "eve", "magic-number")];

    // s3 has no answers at all yet.
    assert_eq!(
        select_next_question(&responses, &questions, "eve", &mut rng),
        NextQuestion::Unanswered {
            submission: "s3".into()
        }
    );

    responses.push(response("s3", "eve", "magic-number"));
    responses.push(response("s1", "fay", "redundant-if"));
    // Everything has votes; eve answered both.
    assert_eq!(
        select_next_question(&responses, &questions, "eve", &mut rng),
        NextQuestion::Exhausted
    );
    // gus answered nothing: the split question s1 is more uncertain than s3.
    let next = select_next_question(&responses, &questions, "gus", &mut rng);
    assert_eq!(next.submission(), Some("s1"));
}

#[test]
fn pairwise_rows_round_trip_through_json() {
    let primary: BTreeMap<String, f64> = [("a".to_string(), 1.0), ("b".to_string(), 1.0)].into();
    let secondary: BTreeMap<String, f64> = [("a".to_string(), 0.5)].into();
    let rows = pairwise_from_scores("s1", &["a".into(), "b".into()], &primary, &secondary);
    let json = serde_json::to_string(&rows).unwrap();
    let back: Vec<PairwiseComparison> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, rows);
}
